use std::path::{Path, PathBuf};
use tokio::fs;

use crate::parse::{CafeteriaMenu, MenuPage};

const STUDENT_FILE: &str = "student_menu.json";
const STAFF_FILE: &str = "staff_menu.json";

/// Keeps the last crawled menu on disk as two pretty-printed JSON files,
/// one per cafeteria.
#[derive(Debug, Clone)]
pub struct FileStore(PathBuf);

impl FileStore {
    pub fn open(dir: impl AsRef<Path>) -> Self {
        Self(dir.as_ref().to_owned())
    }

    pub fn student_path(&self) -> PathBuf {
        self.0.join(STUDENT_FILE)
    }

    pub fn staff_path(&self) -> PathBuf {
        self.0.join(STAFF_FILE)
    }

    /// `None` unless both files exist.
    pub async fn load(&self) -> crate::Result<Option<MenuPage>> {
        let (student_path, staff_path) = (self.student_path(), self.staff_path());
        if !(fs::try_exists(&student_path).await? && fs::try_exists(&staff_path).await?) {
            return Ok(None);
        }
        let student: CafeteriaMenu = serde_json::from_slice(&fs::read(&student_path).await?)?;
        let staff: CafeteriaMenu = serde_json::from_slice(&fs::read(&staff_path).await?)?;
        Ok(Some(MenuPage::from_parts(student, staff)))
    }

    pub async fn save(&self, menu: &MenuPage) -> crate::Result<()> {
        fs::create_dir_all(&self.0).await?;
        fs::write(self.student_path(), serde_json::to_vec_pretty(&menu.student)?).await?;
        fs::write(self.staff_path(), serde_json::to_vec_pretty(&menu.staff)?).await?;
        Ok(())
    }
}
