pub mod blend_channels;
pub mod blend_space;
pub mod calibration;
pub mod collaborators;
pub mod distance_matching;
pub mod errors;
pub mod interpolation;
pub mod motion_matcher;
pub mod player;
pub mod plugin;
pub mod pose_database;
pub mod search;
pub mod settings;
pub mod systems;
pub mod time_matching;
pub mod utils;
