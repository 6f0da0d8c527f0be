pub mod analysis;
pub mod cleaning;
pub mod clustering;
pub mod correlation;
pub mod features;
pub mod figures;
pub mod output;
pub mod pipeline;
pub mod reduction;
pub mod regression;
pub mod stats;
