//! CSV fixture backup
//!
//! Fixed column order, booleans written as `True`/`False` (and accepted in
//! any of the usual spellings on import, via the fixture's own admission
//! deserializers):
//!
//! `id,enabled,universe,start_addr,pan_coarse,pan_fine,tilt_coarse,
//! tilt_fine,dimmer,zoom,zoom_fine,color_temp_channel,color_temp_value,
//! invert_pan,invert_tilt,pan_bias,tilt_bias,status_led`

use serde::Serialize;

use followspot_core::Fixture;

use crate::error::Result;

/// Outbound record: same columns as [`Fixture`], booleans as True/False.
#[derive(Debug, Serialize)]
struct CsvFixture<'a> {
    id: &'a str,
    enabled: &'static str,
    universe: u16,
    start_addr: u16,
    pan_coarse: u16,
    pan_fine: u16,
    tilt_coarse: u16,
    tilt_fine: u16,
    dimmer: u16,
    zoom: u16,
    zoom_fine: u16,
    color_temp_channel: u16,
    color_temp_value: u8,
    invert_pan: &'static str,
    invert_tilt: &'static str,
    pan_bias: i16,
    tilt_bias: i16,
    status_led: u8,
}

fn boolish(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

impl<'a> From<&'a Fixture> for CsvFixture<'a> {
    fn from(f: &'a Fixture) -> Self {
        Self {
            id: &f.id,
            enabled: boolish(f.enabled),
            universe: f.universe,
            start_addr: f.start_addr,
            pan_coarse: f.pan_coarse,
            pan_fine: f.pan_fine,
            tilt_coarse: f.tilt_coarse,
            tilt_fine: f.tilt_fine,
            dimmer: f.dimmer,
            zoom: f.zoom,
            zoom_fine: f.zoom_fine,
            color_temp_channel: f.color_temp_channel,
            color_temp_value: f.color_temp_value,
            invert_pan: boolish(f.invert_pan),
            invert_tilt: boolish(f.invert_tilt),
            pan_bias: f.pan_bias,
            tilt_bias: f.tilt_bias,
            status_led: f.status_led,
        }
    }
}

/// Render the fixture list as CSV with a header row.
pub fn export(fixtures: &[Fixture]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for fixture in fixtures {
        writer.serialize(CsvFixture::from(fixture))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(std::io::Error::other(e.to_string())))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Parse a CSV document into fixtures. Rows deserialize through the same
/// admission tolerances as the JSON API (string booleans, stringy
/// numbers); domain validation happens at the store.
pub fn import(text: &str) -> Result<Vec<Fixture>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let mut fixtures = Vec::new();
    for record in reader.deserialize() {
        let fixture: Fixture = record?;
        fixtures.push(fixture);
    }
    Ok(fixtures)
}
