use crate::survey::*;

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ImageLookup {
    Found(PathBuf),
    /// The expected location. Shown as a warning instead of the picture.
    Missing(PathBuf),
}

/// Maps alternatives to their pictures.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ImageCatalog {
    directory: PathBuf,
    fallback: String,
}

impl ImageCatalog {
    pub fn new(directory: &Path, fallback: &str) -> ImageCatalog {
        ImageCatalog {
            directory: directory.to_path_buf(),
            fallback: fallback.to_string(),
        }
    }

    pub fn file_name(alternative: &str) -> Option<&'static str> {
        Alternative::parse(alternative).map(|a| match a {
            Alternative::ERickshaw => "E-rickshaw.jpg",
            Alternative::PublicBikeSharing => "Public Bike Sharing System.jpg",
            Alternative::Walking => "Walking.jpg",
        })
    }

    /// Case-insensitive on the alternative name. Never fails: a missing file is
    /// reported as such.
    pub fn lookup(&self, alternative: &str) -> ImageLookup {
        let name = ImageCatalog::file_name(alternative).unwrap_or(self.fallback.as_str());
        let path = self.directory.join(name);
        if path.is_file() {
            ImageLookup::Found(path)
        } else {
            warn!("ImageCatalog: no image for {:?} at {:?}", alternative, path);
            ImageLookup::Missing(path)
        }
    }
}
