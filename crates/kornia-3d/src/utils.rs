/// Utility function to convert a 3D array to a faer column vector.
/// # Arguments
///
/// * `array` - A 3D array.
///
/// # Returns
///
/// A faer column vector.
pub fn array3_to_faer_col(array: &[f64; 3]) -> faer::ColRef<'_, f64> {
    faer::col::from_slice(array.as_slice())
}

/// Utility function to convert a 3x3 array to a faer matrix 3x3.
///
/// The array is read in row-major order, `array[row][col]`.
pub fn array33_to_faer_mat33(array: &[[f64; 3]; 3]) -> faer::MatRef<'_, f64> {
    faer::mat::from_row_major_slice(array.as_flattened(), 3, 3)
}

/// Copy a 3x3 faer matrix into a row-major array.
pub fn faer_mat33_to_array33(mat: faer::MatRef<'_, f64>) -> [[f64; 3]; 3] {
    let mut array = [[0.0; 3]; 3];
    for (i, row) in array.iter_mut().enumerate() {
        for (j, val) in row.iter_mut().enumerate() {
            *val = mat.read(i, j);
        }
    }
    array
}
