//! Temperature unit conversion and the heat index.

/// Converts degrees Celsius to degrees Fahrenheit.
pub fn convert_c_to_f(celsius: f32) -> f32 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Converts degrees Fahrenheit to degrees Celsius.
pub fn convert_f_to_c(fahrenheit: f32) -> f32 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

/// Computes the heat index in degrees Fahrenheit using the Rothfusz regression.
///
/// # Arguments
///
/// * `temp_f` - Air temperature in degrees Fahrenheit.
/// * `humidity` - Relative humidity in percent.
pub fn compute_heat_index(temp_f: f32, humidity: f32) -> f32 {
    let t = temp_f as f64;
    let h = humidity as f64;

    let index = -42.379
        + 2.04901523 * t
        + 10.14333127 * h
        + -0.22475541 * t * h
        + -0.00683783 * (t * t)
        + -0.05481717 * (h * h)
        + 0.00122874 * (t * t) * h
        + 0.00085282 * t * (h * h)
        + -0.00000199 * (t * t) * (h * h);

    index as f32
}
