//! Disk-image installation of the application bundle.
//!
//! Mounts the downloaded image, copies the bundle over the installed one,
//! unmounts, and removes the image. There is no rollback: a failure after the
//! old bundle is deleted leaves the installation absent or partial.

use crate::config::UpdateConfig;
use crate::error::{Result, UpdateError};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Attaches and detaches disk images.
pub trait DiskImageTool: Send + Sync {
    /// Mount `image` and return the tool's line-oriented output.
    fn attach(&self, image: &Path) -> Result<String>;

    /// Unmount the volume at `mount_point`.
    fn detach(&self, mount_point: &Path) -> Result<()>;
}

/// `hdiutil`-backed [`DiskImageTool`] (macOS).
#[derive(Debug, Default, Clone, Copy)]
pub struct Hdiutil;

impl Hdiutil {
    fn program() -> Result<PathBuf> {
        which::which("hdiutil")
            .map_err(|e| UpdateError::Mount(format!("hdiutil not available: {e}")))
    }
}

impl DiskImageTool for Hdiutil {
    fn attach(&self, image: &Path) -> Result<String> {
        let output = std::process::Command::new(Self::program()?)
            .arg("attach")
            .arg(image)
            .output()
            .map_err(|e| UpdateError::Mount(format!("cannot run hdiutil attach: {e}")))?;

        if !output.status.success() {
            return Err(UpdateError::Mount(format!(
                "failed to mount {}: {}",
                image.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn detach(&self, mount_point: &Path) -> Result<()> {
        let output = std::process::Command::new(Self::program()?)
            .arg("detach")
            .arg(mount_point)
            .output()
            .map_err(|e| UpdateError::Mount(format!("cannot run hdiutil detach: {e}")))?;

        if !output.status.success() {
            return Err(UpdateError::Mount(format!(
                "failed to unmount {}: {}",
                mount_point.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// Find the mount point of the volume whose line contains `label`.
///
/// `hdiutil attach` prints one tab-separated line per device; the mount point
/// is the last field. Lines without tab-separated fields (progress chatter
/// such as "Checksumming ...") never match.
pub fn find_mount_point(attach_output: &str, label: &str) -> Option<PathBuf> {
    attach_output
        .lines()
        .filter(|line| line.contains(label))
        .find_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 2 {
                return None;
            }
            fields
                .last()
                .map(|f| f.trim())
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
        })
}

/// Whole-disk device (`/dev/diskN`) from `hdiutil attach` output.
///
/// Detaching the device unmounts every volume of the image.
pub fn attached_device(attach_output: &str) -> Option<PathBuf> {
    attach_output
        .lines()
        .filter_map(|line| line.split('\t').next())
        .map(str::trim)
        .find(|field| field.starts_with("/dev/"))
        .map(PathBuf::from)
}

/// Detaches a mounted image when dropped unless [`MountGuard::detach`] ran.
struct MountGuard<'a> {
    tool: &'a dyn DiskImageTool,
    mount_point: Option<PathBuf>,
}

impl MountGuard<'_> {
    fn detach(mut self) -> Result<()> {
        match self.mount_point.take() {
            Some(mount_point) => self.tool.detach(&mount_point),
            None => Ok(()),
        }
    }
}

impl Drop for MountGuard<'_> {
    fn drop(&mut self) {
        if let Some(mount_point) = self.mount_point.take()
            && let Err(e) = self.tool.detach(&mount_point)
        {
            tracing::warn!("failed to unmount {}: {e}", mount_point.display());
        }
    }
}

/// Where a successful install put things.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Installed bundle path.
    pub bundle_path: PathBuf,
    /// Volume the image was mounted at (already unmounted).
    pub mount_point: PathBuf,
}

/// Replaces the installed bundle with the one inside a disk image.
pub struct BundleInstaller {
    tool: Arc<dyn DiskImageTool>,
    install_dir: PathBuf,
    bundle_name: String,
    volume_label: String,
}

impl BundleInstaller {
    /// Create an installer targeting `install_dir/bundle_name`.
    pub fn new(
        tool: Arc<dyn DiskImageTool>,
        install_dir: impl Into<PathBuf>,
        bundle_name: impl Into<String>,
        volume_label: impl Into<String>,
    ) -> Self {
        Self {
            tool,
            install_dir: install_dir.into(),
            bundle_name: bundle_name.into(),
            volume_label: volume_label.into(),
        }
    }

    /// Installer for the bundle described by `config`.
    pub fn from_config(config: &UpdateConfig, tool: Arc<dyn DiskImageTool>) -> Self {
        Self::new(
            tool,
            config.install_dir.clone(),
            config.bundle_name.clone(),
            config.volume_label.clone(),
        )
    }

    /// Final location of the installed bundle.
    pub fn target_path(&self) -> PathBuf {
        self.install_dir.join(&self.bundle_name)
    }

    /// Install the bundle from `image`.
    ///
    /// 1. Mount the image and locate the volume by label
    /// 2. Locate the bundle inside the volume
    /// 3. Delete any existing bundle at the target path
    /// 4. Copy the new bundle into place
    /// 5. Unmount and delete the image
    ///
    /// # Errors
    ///
    /// - [`UpdateError::Mount`] if mounting fails or the volume/bundle cannot
    ///   be found; the installed bundle is untouched in that case
    /// - [`UpdateError::InstallCopy`] if the delete, copy, or image cleanup fails
    pub fn install(&self, image: &Path, version: &str) -> Result<InstallReport> {
        tracing::info!("installing {version} from {}", image.display());

        let attach_output = self.tool.attach(image)?;
        let Some(mount_point) = find_mount_point(&attach_output, &self.volume_label) else {
            if let Some(device) = attached_device(&attach_output)
                && let Err(e) = self.tool.detach(&device)
            {
                tracing::warn!("failed to detach {}: {e}", device.display());
            }
            return Err(UpdateError::Mount(format!(
                "could not find a mounted volume matching {:?}",
                self.volume_label
            )));
        };
        tracing::debug!("mounted at {}", mount_point.display());

        let guard = MountGuard {
            tool: self.tool.as_ref(),
            mount_point: Some(mount_point.clone()),
        };

        let source = mount_point.join(&self.bundle_name);
        if !source.is_dir() {
            return Err(UpdateError::Mount(format!(
                "{} not found in mounted volume {}",
                self.bundle_name,
                mount_point.display()
            )));
        }

        let target = self.target_path();
        if std::fs::symlink_metadata(&target).is_ok() {
            remove_path(&target).map_err(|e| {
                UpdateError::InstallCopy(format!("cannot remove {}: {e}", target.display()))
            })?;
        }

        copy_bundle(&source, &target).map_err(|e| {
            UpdateError::InstallCopy(format!(
                "cannot copy {} to {}: {e}",
                source.display(),
                target.display()
            ))
        })?;

        // The new bundle is in place; an unmount failure only leaks the mount.
        if let Err(e) = guard.detach() {
            tracing::warn!("{e}");
        }

        std::fs::remove_file(image).map_err(|e| {
            UpdateError::InstallCopy(format!("cannot remove {}: {e}", image.display()))
        })?;

        tracing::info!("bundle updated at {}", target.display());
        Ok(InstallReport {
            bundle_path: target,
            mount_point,
        })
    }
}

fn remove_path(path: &Path) -> std::io::Result<()> {
    let meta = std::fs::symlink_metadata(path)?;
    if meta.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    }
}

/// Recursively copy `src` to `dst`, keeping symlinks as links.
fn copy_bundle(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in walkdir::WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(std::io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(std::io::Error::other)?;
        let dest = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            std::fs::create_dir_all(&dest)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &dest)?;
        } else {
            std::fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> std::io::Result<()> {
    let target = std::fs::read_link(src)?;
    std::os::unix::fs::symlink(target, dst)
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::copy(src, dst).map(|_| ())
}
