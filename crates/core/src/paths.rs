use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        let base = dirs::home_dir()
            .map(|h| h.join(".gatewatch"))
            .unwrap_or_else(|| PathBuf::from(".gatewatch"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }

    /// Seed file for the in-memory activity store used by the CLI.
    pub fn activities_seed_file(&self) -> PathBuf {
        self.base.join("activities.json")
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}
