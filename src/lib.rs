pub mod analysis_service;
pub mod api;
pub mod config;
pub mod data_structures;
pub mod error;
pub mod presentation;
pub mod provider;
pub mod regression;
pub mod returns;
pub mod yahoo;
