pub mod toml_loader;

pub use toml_loader::{load_seed_file, load_seed_files, SeedFile, SeedQuiz, SeedStudent};
