pub mod callback;
pub mod db;
pub mod fitbit_api;
pub mod json_file;
pub mod oauth;
pub mod token_store;
