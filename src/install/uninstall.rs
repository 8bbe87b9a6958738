//! Uninstallation: two confirmations, then recursive removal of the install
//! directory

use std::collections::VecDeque;
use std::path::Path;

use log::{info, warn};

use super::error::InstallerError;

/// Source of yes/no answers, decoupled from how they are collected
pub trait Confirmation {
    /// Ask `prompt`; `true` only for an explicit affirmative answer
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F> Confirmation for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Pre-recorded answers consumed in order; anything beyond them is "no"
#[derive(Debug, Clone, Default)]
pub struct ScriptedConfirmation {
    answers: VecDeque<bool>,
}

impl ScriptedConfirmation {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
        }
    }

    /// Answers left unused
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Confirmation for ScriptedConfirmation {
    fn confirm(&mut self, _prompt: &str) -> bool {
        self.answers.pop_front().unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UninstallOutcome {
    Removed,
    /// A confirmation was declined; nothing was touched
    Aborted,
}

/// Ask both confirmations and delete `install_dir` when both are affirmative.
/// The second question is not asked when the first is declined.
pub fn run_uninstall(
    install_dir: &Path,
    confirm: &mut dyn Confirmation,
) -> Result<UninstallOutcome, InstallerError> {
    let first = format!("Uninstall and delete {}?", install_dir.display());
    if !confirm.confirm(&first) {
        info!("Uninstall declined at first confirmation");
        return Ok(UninstallOutcome::Aborted);
    }

    let second = "All files in the install directory will be permanently deleted. Continue?";
    if !confirm.confirm(second) {
        info!("Uninstall declined at second confirmation");
        return Ok(UninstallOutcome::Aborted);
    }

    remove_install_dir(install_dir)?;
    Ok(UninstallOutcome::Removed)
}

fn remove_install_dir(install_dir: &Path) -> Result<(), InstallerError> {
    info!("Removing {}", install_dir.display());
    match std::fs::remove_dir_all(install_dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("{} already absent", install_dir.display());
            Ok(())
        }
        Err(e) => Err(InstallerError::Uninstall(format!(
            "cannot delete {}: {e}",
            install_dir.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated() -> (tempfile::TempDir, std::path::PathBuf) {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("App");
        std::fs::create_dir_all(dir.join("lib")).unwrap();
        std::fs::write(dir.join("lib").join("core.dat"), b"data").unwrap();
        (root, dir)
    }

    #[test]
    fn test_both_confirmations_remove_directory() {
        let (_root, dir) = populated();
        let mut answers = ScriptedConfirmation::new([true, true]);
        assert_eq!(
            run_uninstall(&dir, &mut answers).unwrap(),
            UninstallOutcome::Removed
        );
        assert!(!dir.exists());
    }

    #[test]
    fn test_first_decline_skips_second_question() {
        let (_root, dir) = populated();
        let mut answers = ScriptedConfirmation::new([false, true]);
        assert_eq!(
            run_uninstall(&dir, &mut answers).unwrap(),
            UninstallOutcome::Aborted
        );
        assert_eq!(answers.remaining(), 1);
        assert!(dir.join("lib").join("core.dat").exists());
    }

    #[test]
    fn test_second_decline_keeps_directory() {
        let (_root, dir) = populated();
        let mut asked = Vec::new();
        let mut confirm = |prompt: &str| {
            asked.push(prompt.to_string());
            asked.len() == 1
        };
        assert_eq!(
            run_uninstall(&dir, &mut confirm).unwrap(),
            UninstallOutcome::Aborted
        );
        assert_eq!(asked.len(), 2);
        assert!(dir.exists());
    }

    #[test]
    fn test_missing_answers_mean_no() {
        let (_root, dir) = populated();
        let mut answers = ScriptedConfirmation::new([true]);
        assert_eq!(
            run_uninstall(&dir, &mut answers).unwrap(),
            UninstallOutcome::Aborted
        );
        assert!(dir.exists());
    }
}
