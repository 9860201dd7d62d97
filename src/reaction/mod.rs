//! Gas properties and the combustion models that release heat into the cylinder
pub mod combustion;
pub mod gas;
