pub mod followup;
pub mod goals;
pub mod leads;
pub mod nba;
pub mod plans;
pub mod scoring;
