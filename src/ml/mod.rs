pub mod dataset;
pub mod feedback;
pub mod forest;
pub mod predictor;
