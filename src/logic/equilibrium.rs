use crate::models::GrainType;

/// Relative humidity columns of the equilibrium tables, in percent.
const RH_COLUMNS: [f64; 13] = [
    30.0, 35.0, 40.0, 45.0, 50.0, 55.0, 60.0, 65.0, 70.0, 75.0, 80.0, 85.0, 90.0,
];

/// Grain temperature rows, in °C.
const TEMP_ROWS: [f64; 12] = [
    10.0, 12.0, 14.0, 16.0, 18.0, 20.0, 22.0, 24.0, 26.0, 28.0, 30.0, 32.0,
];

type EmcTable = [[f64; 13]; 12];

/// Equilibrium moisture content (% w.b.) indexed by [temperature row][RH column].
const WHEAT: EmcTable = [
    [10.1, 10.7, 11.3, 11.9, 12.6, 13.2, 13.9, 14.6, 15.3, 16.2, 17.2, 18.4, 20.0],
    [9.9, 10.6, 11.2, 11.8, 12.4, 13.1, 13.7, 14.4, 15.2, 16.1, 17.1, 18.3, 19.9],
    [9.8, 10.4, 11.0, 11.7, 12.3, 12.9, 13.6, 14.3, 15.1, 16.0, 17.0, 18.2, 19.8],
    [9.7, 10.3, 10.9, 11.5, 12.1, 12.8, 13.5, 14.2, 15.0, 15.8, 16.8, 18.1, 19.7],
    [9.5, 10.1, 10.8, 11.4, 12.0, 12.7, 13.3, 14.1, 14.8, 15.7, 16.7, 18.0, 19.6],
    [9.4, 10.0, 10.6, 11.3, 11.9, 12.5, 13.2, 13.9, 14.7, 15.6, 16.6, 17.8, 19.5],
    [9.3, 9.9, 10.5, 11.1, 11.8, 12.4, 13.1, 13.8, 14.6, 15.5, 16.5, 17.7, 19.4],
    [9.1, 9.8, 10.4, 11.0, 11.6, 12.3, 13.0, 13.7, 14.5, 15.4, 16.4, 17.6, 19.3],
    [9.0, 9.6, 10.3, 10.9, 11.5, 12.2, 12.9, 13.6, 14.4, 15.3, 16.3, 17.5, 19.2],
    [8.9, 9.5, 10.2, 10.8, 11.4, 12.1, 12.8, 13.5, 14.3, 15.2, 16.2, 17.4, 19.1],
    [8.8, 9.4, 10.0, 10.7, 11.3, 12.0, 12.6, 13.4, 14.2, 15.1, 16.1, 17.3, 19.0],
    [8.6, 9.3, 9.9, 10.6, 11.2, 11.9, 12.5, 13.3, 14.1, 15.0, 16.0, 17.2, 18.9],
];

const SOYBEAN: EmcTable = [
    [6.1, 7.0, 7.8, 8.6, 9.5, 10.3, 11.2, 12.2, 13.2, 14.4, 15.7, 17.3, 19.4],
    [6.0, 6.9, 7.7, 8.5, 9.4, 10.2, 11.1, 12.1, 13.1, 14.3, 15.6, 17.2, 19.3],
    [5.9, 6.7, 7.6, 8.4, 9.3, 10.1, 11.0, 12.0, 13.0, 14.2, 15.5, 17.1, 19.2],
    [5.8, 6.6, 7.5, 8.3, 9.2, 10.0, 10.9, 11.9, 12.9, 14.1, 15.4, 17.0, 19.1],
    [5.7, 6.5, 7.4, 8.2, 9.1, 9.9, 10.8, 11.8, 12.8, 14.0, 15.3, 16.9, 19.0],
    [5.6, 6.4, 7.3, 8.1, 9.0, 9.8, 10.7, 11.7, 12.8, 13.9, 15.2, 16.9, 19.0],
    [5.4, 6.3, 7.2, 8.0, 8.9, 9.7, 10.7, 11.6, 12.7, 13.8, 15.2, 16.8, 18.9],
    [5.3, 6.2, 7.1, 7.9, 8.8, 9.6, 10.6, 11.5, 12.6, 13.7, 15.1, 16.7, 18.8],
    [5.2, 6.1, 7.0, 7.8, 8.7, 9.6, 10.5, 11.4, 12.5, 13.7, 15.0, 16.6, 18.7],
    [5.1, 6.0, 6.9, 7.7, 8.6, 9.5, 10.4, 11.3, 12.4, 13.6, 14.9, 16.5, 18.6],
    [5.0, 5.9, 6.8, 7.6, 8.5, 9.4, 10.3, 11.3, 12.3, 13.5, 14.8, 16.5, 18.6],
    [4.9, 5.8, 6.7, 7.5, 8.4, 9.3, 10.2, 11.2, 12.2, 13.4, 14.8, 16.4, 18.5],
];

const CORN: EmcTable = [
    [9.9, 10.6, 11.2, 11.8, 12.5, 13.1, 13.8, 14.6, 15.4, 16.3, 17.3, 18.6, 20.3],
    [9.7, 10.3, 11.0, 11.6, 12.3, 12.9, 13.6, 14.4, 15.2, 16.1, 17.1, 18.4, 20.0],
    [9.4, 10.1, 10.7, 11.4, 12.0, 12.7, 13.4, 14.2, 15.0, 15.9, 16.9, 18.2, 19.9],
    [9.2, 9.9, 10.5, 11.2, 11.8, 12.5, 13.2, 14.0, 14.8, 15.7, 16.7, 18.0, 19.7],
    [9.0, 9.7, 10.3, 11.0, 11.6, 12.3, 13.0, 13.8, 14.6, 15.5, 16.6, 17.9, 19.5],
    [8.8, 9.5, 10.1, 10.8, 11.5, 12.1, 12.8, 13.6, 14.4, 15.3, 16.4, 17.7, 19.4],
    [8.6, 9.3, 10.0, 10.6, 11.3, 12.0, 12.7, 13.4, 14.3, 15.2, 16.2, 17.5, 19.2],
    [8.5, 9.1, 9.8, 10.4, 11.1, 11.8, 12.5, 13.3, 14.1, 15.0, 16.1, 17.4, 19.1],
    [8.3, 8.9, 9.6, 10.3, 10.9, 11.6, 12.3, 13.1, 13.9, 14.9, 15.9, 17.2, 19.0],
    [8.1, 8.8, 9.4, 10.1, 10.8, 11.5, 12.2, 12.9, 13.8, 14.7, 15.8, 17.1, 18.8],
    [7.9, 8.6, 9.3, 9.9, 10.6, 11.3, 12.0, 12.8, 13.6, 14.6, 15.6, 17.0, 18.7],
    [7.8, 8.4, 9.1, 9.8, 10.5, 11.1, 11.9, 12.6, 13.5, 14.4, 15.5, 16.8, 18.6],
];

fn table_for(grain: GrainType) -> &'static EmcTable {
    match grain {
        GrainType::Wheat => &WHEAT,
        GrainType::Soybean => &SOYBEAN,
        GrainType::Corn => &CORN,
    }
}

/// Dew point (°C) by the Magnus approximation.
pub fn dew_point(temperature_c: f64, relative_humidity: f64) -> f64 {
    const A: f64 = 17.62;
    const B: f64 = 243.12;

    // ln(0) is undefined; 1% RH already puts the dew point far below any grain
    let rh = relative_humidity.clamp(1.0, 100.0);
    let gamma = (rh / 100.0).ln() + (A * temperature_c) / (B + temperature_c);
    (B * gamma) / (A - gamma)
}

fn interpolate(x: f64, x0: f64, y0: f64, x1: f64, y1: f64) -> f64 {
    if x0 == x1 {
        return y0;
    }
    y0 + (x - x0) * (y1 - y0) / (x1 - x0)
}

/// Relative humidity at which one temperature row holds `moisture`.
fn rh_for_row(row: &[f64; 13], moisture: f64) -> Option<f64> {
    row.windows(2)
        .zip(RH_COLUMNS.windows(2))
        .find(|(m, _)| {
            let (lo, hi) = (m[0].min(m[1]), m[0].max(m[1]));
            lo <= moisture && moisture <= hi
        })
        .map(|(m, rh)| interpolate(moisture, m[0], rh[0], m[1], rh[1]))
}

/// Equilibrium relative humidity (%) for grain of the given type to settle
/// at `target_moisture` while at `grain_temp`. Inverse bilinear lookup over
/// the grain's EMC table; `None` when either input falls outside the table.
pub fn equilibrium_humidity(
    grain: GrainType,
    target_moisture: f64,
    grain_temp: f64,
) -> Option<f64> {
    let first = TEMP_ROWS[0];
    let last = TEMP_ROWS[TEMP_ROWS.len() - 1];
    if !(first..=last).contains(&grain_temp) {
        return None;
    }

    let table = table_for(grain);
    let low_idx = TEMP_ROWS.iter().rposition(|t| *t <= grain_temp)?;
    let high_idx = TEMP_ROWS.iter().position(|t| *t >= grain_temp)?;

    let rh_low = rh_for_row(&table[low_idx], target_moisture)?;
    let rh_high = rh_for_row(&table[high_idx], target_moisture)?;

    Some(interpolate(
        grain_temp,
        TEMP_ROWS[low_idx],
        rh_low,
        TEMP_ROWS[high_idx],
        rh_high,
    ))
}
