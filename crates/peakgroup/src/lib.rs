pub mod background;
pub mod binning;
pub mod deisotope;
pub mod mass;
pub mod similarity;
pub mod sorted;
pub mod spectrum;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("scan `{id}`: peak {index} (m/z {mz}) is not sorted by m/z")]
    Unsorted { id: String, index: usize, mz: f64 },
    #[error("scan `{id}`: {mz} m/z values, but {intensity} intensity values")]
    Length {
        id: String,
        mz: usize,
        intensity: usize,
    },
}

pub fn read_json<S, T>(path: S) -> Result<T, Error>
where
    S: AsRef<str>,
    T: for<'de> serde::Deserialize<'de>,
{
    let file = std::fs::File::open(path.as_ref())?;
    let rdr = std::io::BufReader::new(file);
    Ok(serde_json::from_reader(rdr)?)
}
