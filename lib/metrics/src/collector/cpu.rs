/// Sensor labels that identify the CPU package, in order of preference.
const CPU_SENSOR_HINTS: [&str; 5] = ["package", "tctl", "tdie", "cpu", "core"];

/// Clamps a raw load reading into `0..=100`; NaN reads as idle.
pub fn load_percent(raw: f64) -> f64 {
    if raw.is_nan() {
        0.0
    } else {
        raw.clamp(0.0, 100.0)
    }
}

/// Joins vendor and brand the way `lscpu` shows them, without repeating the vendor.
pub fn cpu_name(vendor: &str, brand: &str) -> String {
    let vendor = vendor.trim();
    let brand = brand.trim();

    match (vendor.is_empty(), brand.is_empty()) {
        (true, true) => "Unknown CPU".to_string(),
        (true, false) => brand.to_string(),
        (false, true) => vendor.to_string(),
        (false, false) if brand.starts_with(vendor) => brand.to_string(),
        (false, false) => format!("{} {}", vendor, brand),
    }
}

/// Picks the CPU temperature out of every sensor the host reports.
///
/// Sensors whose label looks like the CPU package win; otherwise the first finite reading
/// is used. Returns `None` when there is no usable sensor.
pub fn pick_temperature<'a, I>(sensors: I) -> Option<f64>
where
    I: IntoIterator<Item = (&'a str, f32)>,
{
    let readings: Vec<(String, f64)> = sensors
        .into_iter()
        .filter(|(_, celsius)| celsius.is_finite())
        .map(|(label, celsius)| (label.to_lowercase(), f64::from(celsius)))
        .collect();

    CPU_SENSOR_HINTS
        .iter()
        .find_map(|hint| {
            readings
                .iter()
                .find(|(label, _)| label.contains(hint))
                .map(|(_, celsius)| *celsius)
        })
        .or_else(|| readings.first().map(|(_, celsius)| *celsius))
}

#[cfg(test)]
mod cpu_tests {
    use super::*;

    #[test]
    fn load_is_clamped() {
        assert_eq!(load_percent(45.3), 45.3);
        assert_eq!(load_percent(-1.0), 0.0);
        assert_eq!(load_percent(140.0), 100.0);
        assert_eq!(load_percent(f64::NAN), 0.0);
    }

    #[test]
    fn name_does_not_repeat_vendor() {
        assert_eq!(
            cpu_name("GenuineIntel", "Intel(R) Core(TM) i7"),
            "GenuineIntel Intel(R) Core(TM) i7"
        );
        assert_eq!(cpu_name("Apple", "Apple M2"), "Apple M2");
        assert_eq!(cpu_name("", " ARMv8 "), "ARMv8");
        assert_eq!(cpu_name(" ", ""), "Unknown CPU");
    }

    #[test]
    fn prefers_package_sensor() {
        let sensors = vec![
            ("acpitz temp1", 30.0_f32),
            ("nvme Composite", 40.0),
            ("coretemp Package id 0", 55.0),
            ("coretemp Core 0", 52.0),
        ];
        assert_eq!(pick_temperature(sensors), Some(55.0));
    }

    #[test]
    fn falls_back_to_first_finite_sensor() {
        let sensors = vec![("acpitz", f32::NAN), ("nvme Composite", 40.0)];
        assert_eq!(pick_temperature(sensors), Some(40.0));
        assert_eq!(pick_temperature(Vec::<(&str, f32)>::new()), None);
    }
}
