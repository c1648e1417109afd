use std::path::{Path, PathBuf};

use instant::Duration;

/// Per-demo settings: window, frame pacing and where assets live.
#[derive(Clone, Debug, PartialEq)]
pub struct DemoConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Sleep after every presented frame.
    pub frame_delay: Duration,
    /// Root that `shaders/` and `sampleModels/` are resolved against.
    pub asset_root: PathBuf,
    pub clear_colour: wgpu::Color,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            title: "flow demo".to_string(),
            width: 800,
            height: 600,
            frame_delay: Duration::from_millis(15),
            asset_root: asset_root_or_cwd(Path::new(env!("CARGO_MANIFEST_DIR"))),
            clear_colour: wgpu::Color::BLACK,
        }
    }
}

/// `compiled` when it still holds `shaders/`, otherwise the working
/// directory. Binaries that were moved or installed look for their assets
/// next to where they are started.
pub fn asset_root_or_cwd(compiled: &Path) -> PathBuf {
    if compiled.join("shaders").is_dir() {
        compiled.to_path_buf()
    } else {
        log::debug!(
            "{} has no shaders, resolving assets against ./",
            compiled.display()
        );
        PathBuf::from(".")
    }
}

impl DemoConfig {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_clear_colour(mut self, clear_colour: wgpu::Color) -> Self {
        self.clear_colour = clear_colour;
        self
    }

    /// The single optional positional argument, or `default` under the asset
    /// root. Arguments after the first are ignored with a warning.
    ///
    /// `args` excludes the program name.
    pub fn model_path<I>(&self, args: I, default: &str) -> PathBuf
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let path = match args.next() {
            Some(arg) => PathBuf::from(arg),
            None => self.asset_root.join(default),
        };
        let extra: Vec<String> = args.collect();
        if !extra.is_empty() {
            log::warn!("ignoring extra arguments {:?}", extra);
        }
        path
    }
}
