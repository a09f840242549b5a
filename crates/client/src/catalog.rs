//! Product catalog assembled from a Drive folder tree.
//!
//! ### Folder conventions
//! - Each sub-folder of the root folder is one product; its id is the product id.
//! - Images directly inside the product folder are its photos, followed by
//!   images in a `photos` sub-folder.
//! - `description/` holds a text file: first line is the title, the rest is
//!   the description.
//! - `price/` holds a text file; all non-digits are stripped.

use async_trait::async_trait;
use futures_util::future::try_join_all;
use vitrine_core::{AppConfig, CatalogSource, Error, Photo, Product};

use crate::drive::{DriveClient, DriveConfig, DriveFile};

const PHOTOS_FOLDER: &str = "photos";
const DESCRIPTION_FOLDER: &str = "description";
const PRICE_FOLDER: &str = "price";

/// Split a description file into `(title, description)`.
///
/// An empty first line falls back to the folder name, an empty remainder to
/// `default_description`.
pub fn split_description(raw: &str, folder_name: &str, default_description: &str) -> (String, String) {
    let (first, rest) = raw.split_once('\n').unwrap_or((raw, ""));

    let title = match first.trim() {
        "" => folder_name.to_string(),
        title => title.to_string(),
    };
    let description = match rest.trim() {
        "" => default_description.to_string(),
        description => description.to_string(),
    };

    (title, description)
}

/// Parse a price file by keeping only its digits.
pub fn parse_price(raw: &str, default_price: i64) -> i64 {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(default_price)
}

fn photos_of(files: &[DriveFile]) -> impl Iterator<Item = Photo> + '_ {
    files
        .iter()
        .filter(|f| f.is_image())
        .map(|f| Photo { id: f.id.clone(), name: f.name.clone() })
}

/// `CatalogSource` backed by a Drive folder tree.
#[derive(Debug, Clone)]
pub struct DriveCatalog {
    drive: DriveClient,
    config: AppConfig,
}

impl DriveCatalog {
    pub fn new(drive: DriveClient, config: AppConfig) -> Self {
        Self { drive, config }
    }

    /// Build the catalog source described by the application configuration.
    ///
    /// Missing credentials or root folder are not checked here; they surface
    /// as `Error::Configuration` from `fetch`.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let drive = DriveClient::new(DriveConfig::from(config))?;
        Ok(Self::new(drive, config.clone()))
    }

    async fn load_product(&self, folder: &DriveFile) -> Result<Product, Error> {
        tracing::debug!(folder = %folder.name, "processing product folder");
        let files = self.drive.list_children(&folder.id, false).await?;

        let mut media: Vec<Photo> = photos_of(&files).collect();
        let mut description_raw = String::new();
        let mut price_raw = String::new();

        for subfolder in files.iter().filter(|f| f.is_folder()) {
            match subfolder.name.as_str() {
                PHOTOS_FOLDER => {
                    let children = self.drive.list_children(&subfolder.id, false).await?;
                    media.extend(photos_of(&children));
                }
                DESCRIPTION_FOLDER => {
                    if let Some(first) = self.first_file(&subfolder.id).await? {
                        description_raw = self.drive.download_text(&first.id).await?;
                    }
                }
                PRICE_FOLDER => {
                    if let Some(first) = self.first_file(&subfolder.id).await? {
                        price_raw = self.drive.download_text(&first.id).await?;
                    }
                }
                _ => {}
            }
        }

        let (title, description) = split_description(&description_raw, &folder.name, &self.config.default_description);
        let price = parse_price(&price_raw, self.config.default_price);

        tracing::debug!(folder = %folder.name, photos = media.len(), "product assembled");
        Ok(Product { id: folder.id.clone(), title, description, price, media })
    }

    async fn first_file(&self, folder_id: &str) -> Result<Option<DriveFile>, Error> {
        let files = self.drive.list_children(folder_id, false).await?;
        Ok(files.into_iter().find(|f| !f.is_folder()))
    }
}

#[async_trait]
impl CatalogSource for DriveCatalog {
    async fn fetch(&self) -> Result<Vec<Product>, Error> {
        self.config.require_credentials()?;
        let root = self.config.require_root_folder_id()?;

        let folders = self.drive.list_children(root, true).await?;
        tracing::info!(root, folders = folders.len(), "fetching product folders");

        try_join_all(folders.iter().map(|folder| self.load_product(folder))).await
    }
}
