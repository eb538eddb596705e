use std::{fmt, sync::LazyLock};

use anyhow::{Result, anyhow};
use regex::Regex;

use crate::error::PipelineError;

/// A coordinate reference system the adapter knows how to reproject.
#[derive(Debug, Clone, PartialEq)]
pub enum Crs {
    /// Geographic WGS84 lon/lat (EPSG:4326).
    Wgs84,
    /// Spherical Web Mercator (EPSG:3857).
    WebMercator,
    /// WGS84 UTM zone (EPSG:326zz north, 327zz south).
    Utm { zone: u8, south: bool },
    /// Any other system given as a PROJ.4 string.
    Proj4(String),
}

impl Crs {
    /// Parse `"EPSG:<code>"` (case-insensitive) or a raw `+proj=` string.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.starts_with("+proj=") {
            return Ok(Crs::Proj4(s.to_string()));
        }

        static EPSG: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"(?i)^(?:epsg:)?(\d{4,5})$").expect("EPSG pattern is a valid regex"));
        let code: u32 = EPSG.captures(s)
            .and_then(|c| c[1].parse().ok())
            .ok_or_else(|| anyhow!(PipelineError::Crs(format!("unrecognized CRS: {s:?}"))))?;

        match code {
            4326 => Ok(Crs::Wgs84),
            3857 => Ok(Crs::WebMercator),
            32601..=32660 => Ok(Crs::Utm { zone: (code - 32600) as u8, south: false }),
            32701..=32760 => Ok(Crs::Utm { zone: (code - 32700) as u8, south: true }),
            _ => Err(anyhow!(PipelineError::Crs(format!("unsupported EPSG code: {code}")))),
        }
    }

    /// UTM zone containing the given lon/lat, on the WGS84 datum.
    pub fn utm_for(lon: f64, lat: f64) -> Self {
        let zone = (((lon + 180.0) / 6.0).floor() as i32 + 1).clamp(1, 60) as u8;
        Crs::Utm { zone, south: lat < 0.0 }
    }

    /// True for lon/lat systems, where coordinates are angles rather than metres.
    pub fn is_geographic(&self) -> bool {
        match self {
            Crs::Wgs84 => true,
            Crs::Proj4(s) => s.contains("+proj=longlat") || s.contains("+proj=latlong"),
            _ => false,
        }
    }

    /// PROJ.4 definition understood by `proj4rs`.
    pub fn proj4(&self) -> String {
        match self {
            Crs::Wgs84 => "+proj=longlat +datum=WGS84 +no_defs +type=crs".to_string(),
            Crs::WebMercator => {
                "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs +type=crs".to_string()
            }
            Crs::Utm { zone, south } => {
                let south = if *south { " +south" } else { "" };
                format!("+proj=utm +zone={zone}{south} +datum=WGS84 +units=m +no_defs +type=crs")
            }
            Crs::Proj4(s) => s.clone(),
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Wgs84 => write!(f, "EPSG:4326"),
            Crs::WebMercator => write!(f, "EPSG:3857"),
            Crs::Utm { zone, south: false } => write!(f, "EPSG:326{zone:02}"),
            Crs::Utm { zone, south: true } => write!(f, "EPSG:327{zone:02}"),
            Crs::Proj4(s) => write!(f, "{s}"),
        }
    }
}
