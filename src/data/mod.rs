pub mod feature;
pub mod mvt;
