//! Lecteur GeoTIFF (`.tif`, `.tiff`) avec le crate `tiff`
//!
//! Les bandes sont les échantillons d'un pixel (configuration entrelacée) de
//! la première image du fichier. Le géoréférencement vient des tags GeoTIFF :
//! `ModelTransformationTag`, sinon `ModelPixelScaleTag` + `ModelTiepointTag`.
//! La valeur nodata est lue dans le tag `GDAL_NODATA`.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tracing::debug;

use crate::grid::{GeoTransform, Grid};
use crate::ZonalError;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

/// Clé `GTRasterTypeGeoKey` et sa valeur `RasterPixelIsPoint`
const RASTER_TYPE_KEY: u32 = 1025;
const PIXEL_IS_POINT: u32 = 2;

/// Lit la bande `band` (à partir de 1) d'un GeoTIFF
pub fn read_geotiff(path: &Path, band: usize) -> Result<Grid, ZonalError> {
    if !path.is_file() {
        return Err(ZonalError::SourceNotFound(path.to_path_buf()));
    }

    let reader = BufReader::new(File::open(path)?);
    let grid = decode(reader, band, &path.display().to_string())?;

    debug!(
        path = %path.display(),
        band = band,
        width = grid.width(),
        height = grid.height(),
        nodata = ?grid.nodata(),
        "Loaded GeoTIFF band"
    );

    Ok(grid)
}

/// Décode un GeoTIFF depuis un flux ; `label` identifie la source dans les erreurs
pub fn decode<R: Read + Seek>(reader: R, band: usize, label: &str) -> Result<Grid, ZonalError> {
    let tiff_err = |e: tiff::TiffError| ZonalError::invalid_raster(label, e.to_string());

    let mut decoder = Decoder::new(reader)
        .map_err(tiff_err)?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions().map_err(tiff_err)?;
    let (width, height) = (width as usize, height as usize);

    let samples = find_u32(&mut decoder, Tag::SamplesPerPixel, label)?.unwrap_or(1) as usize;
    if band == 0 || band > samples {
        return Err(ZonalError::invalid_raster(
            label,
            format!("band {} out of range, raster has {} band(s)", band, samples),
        ));
    }
    if samples > 1 && find_u32(&mut decoder, Tag::PlanarConfiguration, label)? == Some(2) {
        return Err(ZonalError::invalid_raster(
            label,
            "planar (band-separate) layout is not supported",
        ));
    }

    let transform = read_transform(&mut decoder, label)?;
    let nodata = read_nodata(&mut decoder, label)?;

    let pixels = width.checked_mul(height).ok_or_else(|| {
        ZonalError::invalid_raster(label, format!("grid size {}x{} overflows", width, height))
    })?;
    let image = decoder.read_image().map_err(tiff_err)?;
    let values = select_band(image, band, samples);
    if values.len() != pixels {
        return Err(ZonalError::invalid_raster(
            label,
            format!("expected {} pixels ({}x{}), decoded {}", pixels, width, height, values.len()),
        ));
    }

    Grid::new(values, width, height, transform, nodata)
}

/// Extrait une bande des échantillons entrelacés et la convertit en `f64`
fn select_band(image: DecodingResult, band: usize, samples: usize) -> Vec<f64> {
    fn pick<T: Copy>(data: Vec<T>, band: usize, samples: usize, to_f64: fn(T) -> f64) -> Vec<f64> {
        data.into_iter().skip(band - 1).step_by(samples).map(to_f64).collect()
    }

    match image {
        DecodingResult::U8(v) => pick(v, band, samples, f64::from),
        DecodingResult::U16(v) => pick(v, band, samples, f64::from),
        DecodingResult::U32(v) => pick(v, band, samples, f64::from),
        DecodingResult::U64(v) => pick(v, band, samples, |x| x as f64),
        DecodingResult::I8(v) => pick(v, band, samples, f64::from),
        DecodingResult::I16(v) => pick(v, band, samples, f64::from),
        DecodingResult::I32(v) => pick(v, band, samples, f64::from),
        DecodingResult::I64(v) => pick(v, band, samples, |x| x as f64),
        DecodingResult::F32(v) => pick(v, band, samples, f64::from),
        DecodingResult::F64(v) => pick(v, band, samples, |x| x),
    }
}

/// Transformation affine depuis les tags de modèle
fn read_transform<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    label: &str,
) -> Result<GeoTransform, ZonalError> {
    let mut coeffs = if let Some(m) = find_f64_vec(decoder, MODEL_TRANSFORMATION, label)? {
        if m.len() < 8 {
            return Err(ZonalError::invalid_raster(label, "ModelTransformationTag is too short"));
        }
        [m[3], m[0], m[1], m[7], m[4], m[5]]
    } else {
        let scale = find_f64_vec(decoder, MODEL_PIXEL_SCALE, label)?;
        let tiepoint = find_f64_vec(decoder, MODEL_TIEPOINT, label)?;
        match (scale, tiepoint) {
            (Some(s), Some(t)) if s.len() >= 2 && t.len() >= 6 => {
                let (sx, sy) = (s[0], s[1]);
                [t[3] - t[0] * sx, sx, 0.0, t[4] + t[1] * sy, 0.0, -sy]
            }
            _ => {
                return Err(ZonalError::invalid_raster(
                    label,
                    "no georeferencing (ModelTransformationTag or ModelPixelScaleTag + ModelTiepointTag)",
                ))
            }
        }
    };

    // PixelIsPoint : le point de liaison désigne le centre du pixel
    if raster_type(decoder, label)? == Some(PIXEL_IS_POINT) {
        coeffs[0] -= 0.5 * (coeffs[1] + coeffs[2]);
        coeffs[3] -= 0.5 * (coeffs[4] + coeffs[5]);
    }

    GeoTransform::new(coeffs)
}

/// Valeur de `GTRasterTypeGeoKey` dans le répertoire des GeoKeys
fn raster_type<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    label: &str,
) -> Result<Option<u32>, ZonalError> {
    let Some(value) = decoder
        .find_tag(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY))
        .map_err(|e| ZonalError::invalid_raster(label, e.to_string()))?
    else {
        return Ok(None);
    };
    let keys = value
        .into_u32_vec()
        .map_err(|e| ZonalError::invalid_raster(label, e.to_string()))?;

    // En-tête de 4 valeurs puis (clé, emplacement, nombre, valeur)
    Ok(keys
        .get(4..)
        .unwrap_or_default()
        .chunks_exact(4)
        .find(|entry| entry[0] == RASTER_TYPE_KEY && entry[1] == 0)
        .map(|entry| entry[3]))
}

fn read_nodata<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    label: &str,
) -> Result<Option<f64>, ZonalError> {
    let Some(value) = decoder
        .find_tag(Tag::from_u16_exhaustive(GDAL_NODATA))
        .map_err(|e| ZonalError::invalid_raster(label, e.to_string()))?
    else {
        return Ok(None);
    };
    let text = value
        .into_string()
        .map_err(|e| ZonalError::invalid_raster(label, e.to_string()))?;
    let text = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');

    fast_float::parse(text)
        .map(Some)
        .map_err(|_| ZonalError::invalid_raster(label, format!("invalid GDAL_NODATA '{}'", text)))
}

fn find_u32<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    tag: Tag,
    label: &str,
) -> Result<Option<u32>, ZonalError> {
    decoder
        .find_tag(tag)
        .and_then(|value| value.map(|v| v.into_u32()).transpose())
        .map_err(|e| ZonalError::invalid_raster(label, e.to_string()))
}

fn find_f64_vec<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    tag: u16,
    label: &str,
) -> Result<Option<Vec<f64>>, ZonalError> {
    decoder
        .find_tag(Tag::from_u16_exhaustive(tag))
        .and_then(|value| value.map(|v| v.into_f64_vec()).transpose())
        .map_err(|e| ZonalError::invalid_raster(label, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tiff::encoder::{colortype, TiffEncoder};

    /// GeoTIFF en mémoire : échelle + point de liaison, nodata optionnel
    fn encode_gray(width: u32, height: u32, data: &[f32], nodata: Option<&str>) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut encoder = TiffEncoder::new(&mut buffer).unwrap();
            let mut image = encoder.new_image::<colortype::Gray32Float>(width, height).unwrap();
            image
                .encoder()
                .write_tag(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE), &[0.5f64, 0.5, 0.0][..])
                .unwrap();
            image
                .encoder()
                .write_tag(
                    Tag::from_u16_exhaustive(MODEL_TIEPOINT),
                    &[0.0f64, 0.0, 0.0, 10.0, 20.0, 0.0][..],
                )
                .unwrap();
            if let Some(nodata) = nodata {
                image
                    .encoder()
                    .write_tag(Tag::from_u16_exhaustive(GDAL_NODATA), nodata)
                    .unwrap();
            }
            image.write_data(data).unwrap();
        }
        buffer.into_inner()
    }

    #[test]
    fn test_decode_gray_float() {
        let bytes = encode_gray(3, 2, &[1.0, 2.0, 3.0, 4.0, -9999.0, 6.0], Some("-9999"));
        let grid = decode(Cursor::new(bytes), 1, "gray").unwrap();

        assert_eq!((grid.width(), grid.height()), (3, 2));
        assert_eq!(grid.nodata(), Some(-9999.0));
        assert_eq!(grid.row(1), &[4.0, -9999.0, 6.0]);
        assert_eq!(
            grid.transform().coefficients(),
            [10.0, 0.5, 0.0, 20.0, 0.0, -0.5]
        );
        assert_eq!(grid.valid_summary(), (5, 16.0));
    }

    #[test]
    fn test_decode_band_selection() {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut encoder = TiffEncoder::new(&mut buffer).unwrap();
            let mut image = encoder.new_image::<colortype::RGB32Float>(2, 1).unwrap();
            image
                .encoder()
                .write_tag(
                    Tag::from_u16_exhaustive(MODEL_TRANSFORMATION),
                    &[
                        1.0f64, 0.0, 0.0, 100.0, 0.0, -1.0, 0.0, 50.0, 0.0, 0.0, 0.0, 0.0, 0.0,
                        0.0, 0.0, 1.0,
                    ][..],
                )
                .unwrap();
            // Pixel 0 : (1, 10, 100), pixel 1 : (2, 20, 200)
            image.write_data(&[1.0, 10.0, 100.0, 2.0, 20.0, 200.0]).unwrap();
        }
        let bytes = buffer.into_inner();

        let second = decode(Cursor::new(bytes.clone()), 2, "rgb").unwrap();
        assert_eq!(second.row(0), &[10.0, 20.0]);
        assert_eq!(second.nodata(), None);
        assert_eq!(
            second.transform().coefficients(),
            [100.0, 1.0, 0.0, 50.0, 0.0, -1.0]
        );

        let third = decode(Cursor::new(bytes.clone()), 3, "rgb").unwrap();
        assert_eq!(third.row(0), &[100.0, 200.0]);

        match decode(Cursor::new(bytes), 4, "rgb") {
            Err(ZonalError::InvalidRaster { reason, .. }) => assert!(reason.contains("band 4")),
            other => panic!("Expected InvalidRaster, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_without_georeferencing() {
        let mut buffer = Cursor::new(Vec::new());
        TiffEncoder::new(&mut buffer)
            .unwrap()
            .write_image::<colortype::Gray32Float>(1, 1, &[1.0])
            .unwrap();

        assert!(matches!(
            decode(Cursor::new(buffer.into_inner()), 1, "plain"),
            Err(ZonalError::InvalidRaster { .. })
        ));
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(
            decode(Cursor::new(b"not a tiff".to_vec()), 1, "bad"),
            Err(ZonalError::InvalidRaster { .. })
        ));
    }

    #[test]
    fn test_read_file_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pop.tif");
        std::fs::write(&path, encode_gray(1, 1, &[42.0], None)).unwrap();

        let grid = read_geotiff(&path, 1).unwrap();
        assert_eq!(grid.get(0, 0), Some(42.0));

        assert!(matches!(
            read_geotiff(&dir.path().join("missing.tif"), 1),
            Err(ZonalError::SourceNotFound(_))
        ));
    }
}
