//! FishCar host application: composition of the motion control and safety
//! arbitration pipeline around the collaborator seams.

pub mod app;
pub mod config;
pub mod vision;
