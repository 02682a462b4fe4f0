//! Container image acquisition and checkout
//!
//! An [`Image`] moves through explicit states:
//!
//! ```text
//! Unacquired --acquire--> Staged --filesystem--> CheckedOut
//!      \                    \                        |
//!       `-------------------`------teardown----------`--> TornDown
//! ```
//!
//! Staging happens under a fresh directory (see [`StagingArea`]). Nothing is
//! cleaned up automatically: callers own the tree until they call
//! [`Image::teardown`], including after a failed [`Image::acquire`].
//!
//! ```no_run
//! use imgcheck::image::{Image, ImageOptions};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = ImageOptions { pull: true, ..Default::default() };
//! let mut image = Image::pull("quay.io/acme/widget:v2", options)?;
//! println!("{:?}", image.labels()?);
//! if image.file_exists("/etc/os-release")? {
//!     println!("{}", image.read_file("/etc/os-release")?);
//! }
//! image.teardown()?;
//! # Ok(())
//! # }
//! ```

pub mod acquisition;
pub mod digest;
pub mod filesystem;
pub mod manifest;
pub mod reference;

pub use acquisition::{ImageAcquisition, ImageSource, StagedImage, StagingArea};
pub use filesystem::{ImageFilesystem, OpenMode};
pub use manifest::{ContainerConfig, ImageConfig, ManifestEntry};
pub use reference::ImageReference;

use crate::config::{REPOSITORY_ENV, ToolConfig};
use crate::error::{ImageError, Result};
use crate::process::{CommandRunner, SystemRunner, ToolInvocation, run_and_log};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// How to fetch the image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageOptions {
    /// Pull from the registry rather than the local docker daemon
    pub pull: bool,
    /// Plain HTTP or unverified TLS towards the registry
    pub insecure: bool,
    /// The target is a path to a `docker save` archive
    pub archive: bool,
}

#[derive(Debug)]
enum ImageState {
    Unacquired,
    Staged(StagedImage),
    CheckedOut(StagedImage, ImageFilesystem),
    TornDown,
}

impl ImageState {
    fn name(&self) -> &'static str {
        match self {
            ImageState::Unacquired => "unacquired",
            ImageState::Staged(_) => "staged",
            ImageState::CheckedOut(..) => "checked out",
            ImageState::TornDown => "torn down",
        }
    }
}

pub struct Image {
    source: ImageSource,
    insecure: bool,
    tools: ToolConfig,
    runner: Arc<dyn CommandRunner>,
    staging: StagingArea,
    state: ImageState,
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("source", &self.source)
            .field("insecure", &self.insecure)
            .field("staging", &self.staging)
            .field("state", &self.state.name())
            .finish()
    }
}

impl Image {
    /// Host tools, configured from the environment; staged and ready to use.
    pub fn pull(target: &str, options: ImageOptions) -> Result<Self> {
        let mut image = Self::new(target, options, ToolConfig::from_env(), Arc::new(SystemRunner))?;
        image.acquire()?;
        Ok(image)
    }

    /// Create the staging directory without running any tool yet.
    pub fn new(
        target: &str,
        options: ImageOptions,
        tools: ToolConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self> {
        let source = ImageSource::new(target, options.pull, options.archive)?;
        let staging = StagingArea::create(&tools)?;
        Ok(Self {
            source,
            insecure: options.insecure,
            tools,
            runner,
            staging,
            state: ImageState::Unacquired,
        })
    }

    /// Run the pull pipeline. On failure the image stays unacquired and
    /// whatever was staged so far is left for [`Image::teardown`].
    pub fn acquire(&mut self) -> Result<&StagedImage> {
        if !matches!(self.state, ImageState::Unacquired) {
            return Err(self.invalid("acquire"));
        }
        let staged = ImageAcquisition::new(self.runner.as_ref(), &self.tools).acquire(
            &self.staging,
            &self.source,
            self.insecure,
        )?;
        self.state = ImageState::Staged(staged);
        self.staged()
    }

    pub fn state(&self) -> &'static str {
        self.state.name()
    }

    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    pub fn staging_root(&self) -> &Path {
        self.staging.root()
    }

    pub fn staged(&self) -> Result<&StagedImage> {
        match &self.state {
            ImageState::Staged(staged) | ImageState::CheckedOut(staged, _) => Ok(staged),
            _ => Err(self.invalid("inspect")),
        }
    }

    /// Public identifier; for archives this is the archive's base name.
    pub fn name(&self) -> Result<&str> {
        Ok(&self.staged()?.name)
    }

    pub fn labels(&self) -> Result<HashMap<String, String>> {
        Ok(self.staged()?.labels())
    }

    pub fn metadata(&self) -> Result<&ImageConfig> {
        Ok(&self.staged()?.config)
    }

    pub fn checkout_path(&self) -> Option<&Path> {
        match &self.state {
            ImageState::CheckedOut(_, fs) => Some(fs.root()),
            _ => None,
        }
    }

    /// The checkout, mounted on first call and reused afterwards.
    pub fn filesystem(&mut self) -> Result<&ImageFilesystem> {
        let state = std::mem::replace(&mut self.state, ImageState::Unacquired);
        self.state = match state {
            ImageState::Staged(staged) => match self.check_out(&staged) {
                Ok(fs) => ImageState::CheckedOut(staged, fs),
                Err(e) => {
                    self.state = ImageState::Staged(staged);
                    return Err(e);
                }
            },
            other => other,
        };

        match &self.state {
            ImageState::CheckedOut(_, fs) => Ok(fs),
            _ => Err(self.invalid("check out")),
        }
    }

    fn check_out(&self, staged: &StagedImage) -> Result<ImageFilesystem> {
        // Must not exist yet; the mount tool expects an empty directory we own.
        let checkout = self.staging.checkout_path();
        std::fs::create_dir(&checkout).map_err(|source| ImageError::Staging {
            path: checkout.clone(),
            source,
        })?;
        let mount = ToolInvocation::new(&self.tools.atomic)
            .args(["mount", "--storage", "ostree"])
            .arg(staged.mount_source())
            .arg(&checkout)
            .env(REPOSITORY_ENV, &staged.repository_path);
        if let Err(e) = run_and_log(
            self.runner.as_ref(),
            &mount,
            "Failed to mount selected image as an ostree repo.",
        ) {
            // Gone again, so the next access retries the mount.
            if let Err(cleanup) = std::fs::remove_dir_all(&checkout) {
                warn!("failed to remove {}: {}", checkout.display(), cleanup);
            }
            return Err(e.into());
        }
        debug!("checked out {} at {}", staged.name, checkout.display());
        Ok(ImageFilesystem::new(checkout))
    }

    pub fn resolve(&mut self, path: &str) -> Result<PathBuf> {
        Ok(self.filesystem()?.resolve(path))
    }

    pub fn read_file(&mut self, path: &str) -> Result<String> {
        self.filesystem()?.read_file(path)
    }

    pub fn open_file(&mut self, path: &str, mode: OpenMode) -> Result<File> {
        self.filesystem()?.open_file(path, mode)
    }

    pub fn file_exists(&mut self, path: &str) -> Result<bool> {
        self.filesystem()?.file_exists(path)
    }

    /// Unmount the checkout if there is one, then delete the staging tree.
    pub fn teardown(&mut self) -> Result<()> {
        match &self.state {
            ImageState::TornDown => return Err(self.invalid("tear down")),
            ImageState::CheckedOut(staged, fs) => {
                let unmount = ToolInvocation::new(&self.tools.atomic)
                    .arg("unmount")
                    .arg(fs.root())
                    .env(REPOSITORY_ENV, &staged.repository_path);
                run_and_log(
                    self.runner.as_ref(),
                    &unmount,
                    "Failed to unmount ostree checkout.",
                )?;
            }
            ImageState::Unacquired | ImageState::Staged(_) => {}
        }
        self.staging.remove()?;
        debug!("removed staging directory {}", self.staging.root().display());
        self.state = ImageState::TornDown;
        Ok(())
    }

    fn invalid(&self, operation: &'static str) -> ImageError {
        ImageError::InvalidState {
            operation,
            state: self.state.name(),
        }
    }
}
