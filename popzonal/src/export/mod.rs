//! Modules d'export de la table finale (CSV, GeoJSON)

pub mod csv;
pub mod geojson;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Écrit `path` via un fichier temporaire voisin puis un renommage
///
/// Les répertoires parents sont créés. En cas d'erreur le fichier temporaire
/// est supprimé et `path` n'est pas touché.
pub fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let mut staged = StagedWrites::new();
    staged.stage(path, write)?;
    staged.commit()?;
    Ok(())
}

/// Ensemble de sorties écrites en fichiers temporaires, publiées ensemble
///
/// Rien n'apparaît à la destination avant `commit`. Les fichiers temporaires
/// restants sont supprimés quand la valeur est abandonnée.
#[derive(Debug, Default)]
pub struct StagedWrites {
    staged: Vec<(PathBuf, PathBuf)>,
}

impl StagedWrites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Écrit le contenu de `path` dans son fichier temporaire
    pub fn stage<F>(&mut self, path: &Path, write: F) -> Result<()>
    where
        F: FnOnce(&mut BufWriter<File>) -> Result<()>,
    {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let temp_path = temp_path_for(path);
        let result = (|| -> Result<()> {
            let file = File::create(&temp_path)
                .with_context(|| format!("Failed to create file: {}", temp_path.display()))?;
            let mut writer = BufWriter::new(file);
            write(&mut writer)?;
            writer.flush()?;
            writer
                .into_inner()
                .map_err(|e| e.into_error())?
                .sync_all()?;
            Ok(())
        })();

        match result {
            Ok(()) => {
                self.staged.push((temp_path, path.to_path_buf()));
                Ok(())
            }
            Err(e) => {
                let _ = std::fs::remove_file(&temp_path);
                Err(e)
            }
        }
    }

    /// Renomme chaque fichier temporaire vers sa destination
    ///
    /// Si un renommage échoue, les destinations déjà publiées par ce commit
    /// sont retirées.
    pub fn commit(mut self) -> Result<Vec<PathBuf>> {
        let staged = std::mem::take(&mut self.staged);
        let mut published: Vec<PathBuf> = Vec::with_capacity(staged.len());
        let mut pending = staged.into_iter();

        while let Some((temp_path, path)) = pending.next() {
            if let Err(e) = std::fs::rename(&temp_path, &path) {
                let _ = std::fs::remove_file(&temp_path);
                for (temp_path, _) in pending {
                    let _ = std::fs::remove_file(&temp_path);
                }
                for path in &published {
                    let _ = std::fs::remove_file(path);
                }
                return Err(e).with_context(|| format!("Failed to move {} into place", path.display()));
            }
            published.push(path);
        }

        Ok(published)
    }
}

impl Drop for StagedWrites {
    fn drop(&mut self) {
        for (temp_path, _) in &self.staged {
            let _ = std::fs::remove_file(temp_path);
        }
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomically_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.txt");
        write_atomically(&path, |w| Ok(w.write_all(b"hello")?)).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
    }

    #[test]
    fn test_failed_write_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let result = write_atomically(&path, |w| {
            w.write_all(b"partial")?;
            anyhow::bail!("boom")
        });

        assert!(result.is_err());
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_staged_writes_publish_together() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("out").join("b.json");

        let mut staged = StagedWrites::new();
        staged.stage(&a, |w| Ok(w.write_all(b"a")?)).unwrap();
        staged.stage(&b, |w| Ok(w.write_all(b"b")?)).unwrap();
        assert_eq!(staged.len(), 2);
        assert!(!a.exists());
        assert!(!b.exists());

        assert_eq!(staged.commit().unwrap(), vec![a.clone(), b.clone()]);
        assert_eq!(std::fs::read_to_string(&a).unwrap(), "a");
        assert_eq!(std::fs::read_to_string(&b).unwrap(), "b");
    }

    #[test]
    fn test_failed_stage_publishes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.json");

        let mut staged = StagedWrites::new();
        staged.stage(&a, |w| Ok(w.write_all(b"a")?)).unwrap();
        assert!(staged.stage(&b, |_| anyhow::bail!("boom")).is_err());
        drop(staged);

        assert!(!a.exists());
        assert!(!b.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
