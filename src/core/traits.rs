use ndarray::Array1;

/// Objects that can be written as one row of a tab-separated results file
pub trait SaveData {
    fn get_headers(&self) -> String;
    fn num_storable_variables(&self) -> usize;
    fn get_storable_data(&self) -> Array1<f64>;
}
