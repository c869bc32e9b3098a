/// Compiler knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Pool-sharing mode for repeats that do not choose one.
    pub share_pools: bool,
    /// Attribute toggled by hide-mode visibility.
    pub hide_attribute: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            share_pools: true,
            hide_attribute: "hidden".to_string(),
        }
    }
}

impl CompileOptions {
    pub fn share_pools(mut self, share: bool) -> Self {
        self.share_pools = share;
        self
    }

    pub fn hide_attribute(mut self, name: &str) -> Self {
        self.hide_attribute = name.to_string();
        self
    }
}
