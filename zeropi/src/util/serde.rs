use std::{fs::File, path::Path};

use serde::de::DeserializeOwned;

use crate::Error;

pub fn deserialize_from_json_file<T: DeserializeOwned>(file: &Path) -> Result<T, Error> {
    let reader = File::open(file).map_err(|source| Error::Io {
        path: file.display().to_string(),
        source,
    })?;
    Ok(serde_json::from_reader(reader)?)
}
