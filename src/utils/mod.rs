pub mod env_utils;
