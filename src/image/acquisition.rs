//! Pulling an image into a staging repository and reading its metadata.
//!
//! The pull tool stores layers in a repository it can later check out; the
//! metadata comes from a docker archive of the same image, read member by
//! member with `tar`.

use crate::config::{REPOSITORY_ENV, ToolConfig};
use crate::error::{ImageError, Result};
use crate::image::digest;
use crate::image::manifest::{self, ImageConfig, MANIFEST_MEMBER, ManifestEntry};
use crate::image::reference::ImageReference;
use crate::process::{CommandRunner, ToolInvocation, extract_member, run_and_log};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

const REPOSITORY_DIR: &str = "ostree-repo";
const CHECKOUT_DIR: &str = "checkout";
const ARCHIVE_FILE: &str = "archive.tar";

/// Where the image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Pulled from a registry
    Registry(ImageReference),
    /// Taken from the local docker daemon
    Daemon(ImageReference),
    /// A `docker save` archive already on disk
    Archive(PathBuf),
}

impl ImageSource {
    pub fn new(target: &str, pull: bool, is_archive: bool) -> Result<Self> {
        if is_archive {
            return Ok(ImageSource::Archive(PathBuf::from(target)));
        }
        let reference = ImageReference::parse(target)?;
        Ok(if pull {
            ImageSource::Registry(reference)
        } else {
            ImageSource::Daemon(reference)
        })
    }

    /// Identifier the staged image is known by. For archives the pull tool
    /// names the image after the archive's base name.
    pub fn image_name(&self) -> String {
        match self {
            ImageSource::Registry(reference) | ImageSource::Daemon(reference) => reference.name(),
            ImageSource::Archive(path) => path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }

    fn pull_source(&self, insecure: bool) -> String {
        match self {
            ImageSource::Archive(path) => format!("dockertar:/{}", path.display()),
            ImageSource::Registry(reference) if insecure => format!("http:{}", reference.name()),
            ImageSource::Registry(reference) => reference.name(),
            ImageSource::Daemon(reference) => format!("docker:{}", reference.name()),
        }
    }
}

/// The per-image scratch tree: repository, archive, extracted members and,
/// later, the checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    /// Create a fresh `<parent>/<prefix><uuid>` directory.
    pub fn create(tools: &ToolConfig) -> Result<Self> {
        std::fs::create_dir_all(&tools.staging_parent).map_err(|source| ImageError::Staging {
            path: tools.staging_parent.clone(),
            source,
        })?;
        let root = tools.staging_parent.join(format!(
            "{}{}",
            tools.staging_prefix,
            Uuid::new_v4().simple()
        ));
        std::fs::create_dir(&root).map_err(|source| ImageError::Staging {
            path: root.clone(),
            source,
        })?;
        debug!("created staging directory {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Content store of the pull tool; it creates the directory itself.
    pub fn repository_path(&self) -> PathBuf {
        self.root.join(REPOSITORY_DIR)
    }

    pub fn checkout_path(&self) -> PathBuf {
        self.root.join(CHECKOUT_DIR)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.root.join(ARCHIVE_FILE)
    }

    /// Delete the whole tree. Already gone counts as done.
    pub fn remove(&self) -> Result<()> {
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ImageError::Staging {
                path: self.root.clone(),
                source,
            }),
        }
    }
}

/// Result of a successful acquisition.
#[derive(Debug, Clone)]
pub struct StagedImage {
    pub name: String,
    pub insecure: bool,
    pub staging_root: PathBuf,
    pub repository_path: PathBuf,
    pub manifest: Vec<ManifestEntry>,
    pub config: ImageConfig,
    config_blob: Vec<u8>,
}

impl StagedImage {
    pub fn labels(&self) -> HashMap<String, String> {
        self.config.labels()
    }

    /// `sha256:<hex>` of the raw config blob, i.e. the image ID.
    pub fn config_digest(&self) -> String {
        digest::docker_digest(&self.config_blob)
    }

    /// Name handed to the mount tool.
    pub fn mount_source(&self) -> String {
        if self.insecure {
            format!("http:{}", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// Drives the external tools that stage an image.
pub struct ImageAcquisition<'a> {
    runner: &'a dyn CommandRunner,
    tools: &'a ToolConfig,
}

impl<'a> ImageAcquisition<'a> {
    pub fn new(runner: &'a dyn CommandRunner, tools: &'a ToolConfig) -> Self {
        Self { runner, tools }
    }

    /// Stage `target`, a reference or, with `is_archive`, an archive path.
    pub fn acquire_target(
        &self,
        staging: &StagingArea,
        target: &str,
        pull: bool,
        insecure: bool,
        is_archive: bool,
    ) -> Result<StagedImage> {
        let source = ImageSource::new(target, pull, is_archive)?;
        self.acquire(staging, &source, insecure)
    }

    pub fn acquire(
        &self,
        staging: &StagingArea,
        source: &ImageSource,
        insecure: bool,
    ) -> Result<StagedImage> {
        let repository_path = staging.repository_path();
        let pull = ToolInvocation::new(&self.tools.atomic)
            .args(["pull", "--storage", "ostree"])
            .arg(source.pull_source(insecure))
            .env(REPOSITORY_ENV, &repository_path);
        run_and_log(
            self.runner,
            &pull,
            "Failed to pull selected container image. Does it exist?",
        )?;

        let archive_path = match source {
            ImageSource::Archive(path) => path.clone(),
            ImageSource::Registry(reference) => {
                self.copy_to_archive(staging, format!("docker://{}", reference.name()), insecure)?
            }
            ImageSource::Daemon(reference) => self.copy_to_archive(
                staging,
                format!("docker-daemon:{}", reference.name()),
                insecure,
            )?,
        };

        let manifest = self.extract_manifest(staging, &archive_path)?;
        let config_member = &manifest[0].config;
        let member_path = staged_member_path(staging.root(), config_member)?;
        let config_blob = self.extract(&archive_path, config_member, &member_path, staging)?;
        let config: ImageConfig =
            serde_json::from_slice(&config_blob).map_err(|source| ImageError::Json {
                path: member_path,
                source,
            })?;

        let name = source.image_name();
        debug!("staged image {} in {}", name, staging.root().display());
        Ok(StagedImage {
            name,
            insecure,
            staging_root: staging.root().to_path_buf(),
            repository_path,
            manifest,
            config,
            config_blob,
        })
    }

    /// Second download of the image, this time as a docker archive the
    /// metadata can be read from.
    fn copy_to_archive(
        &self,
        staging: &StagingArea,
        copy_source: String,
        insecure: bool,
    ) -> Result<PathBuf> {
        let archive_path = staging.archive_path();
        let mut copy = ToolInvocation::new(&self.tools.skopeo).arg("copy");
        if insecure {
            copy = copy.arg("--src-tls-verify=false");
        }
        let copy = copy
            .arg(copy_source)
            .arg(format!("docker-archive:{}", archive_path.display()));
        run_and_log(
            self.runner,
            &copy,
            "Failed to create tarball with layers from the selected image",
        )?;
        Ok(archive_path)
    }

    fn extract_manifest(
        &self,
        staging: &StagingArea,
        archive_path: &Path,
    ) -> Result<Vec<ManifestEntry>> {
        extract_member(
            self.runner,
            &self.tools.tar,
            archive_path,
            MANIFEST_MEMBER,
            staging.root(),
        )?;
        manifest::read_manifest(&staging.root().join(MANIFEST_MEMBER))
    }

    fn extract(
        &self,
        archive_path: &Path,
        member: &str,
        member_path: &Path,
        staging: &StagingArea,
    ) -> Result<Vec<u8>> {
        extract_member(self.runner, &self.tools.tar, archive_path, member, staging.root())?;
        std::fs::read(member_path).map_err(|source| ImageError::Staging {
            path: member_path.to_path_buf(),
            source,
        })
    }
}

/// Where `tar` puts `member` when extracting into `root`. Members that would
/// land outside of `root` are refused.
fn staged_member_path(root: &Path, member: &str) -> Result<PathBuf> {
    let relative = Path::new(member);
    let contained = relative.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if member.is_empty() || !contained {
        return Err(ImageError::Manifest {
            path: root.join(MANIFEST_MEMBER),
            message: format!("config member '{}' does not stay inside the archive", member),
        });
    }
    Ok(root.join(relative))
}
