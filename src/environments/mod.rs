pub mod hazard_grid;
