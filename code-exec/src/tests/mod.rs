mod languages;
mod sandbox;
mod utils;
