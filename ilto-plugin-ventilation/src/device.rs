/// Chauffage de l'appareil (`telemetry/heating`, directive `L`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Heating {
    Off = 0,
    #[default]
    On = 1,
}

/// Vitesse du ventilateur (`telemetry/speed`, directive `S`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FanSpeed {
    #[default]
    Low = 0,
    Medium = 1,
    High = 2,
}

impl TryFrom<i32> for Heating {
    type Error = TelemetryError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Heating::Off),
            1 => Ok(Heating::On),
            _ => Err(TelemetryError::OutOfRange { field: TelemetryField::Heating, value }),
        }
    }
}

impl TryFrom<i32> for FanSpeed {
    type Error = TelemetryError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FanSpeed::Low),
            1 => Ok(FanSpeed::Medium),
            2 => Ok(FanSpeed::High),
            _ => Err(TelemetryError::OutOfRange { field: TelemetryField::Speed, value }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryField {
    Heating,
    Mode,
    Speed,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("{field:?} telemetry is not an integer: {payload:?}")]
    NotAnInteger { field: TelemetryField, payload: String },
    #[error("{field:?} telemetry out of range: {value}")]
    OutOfRange { field: TelemetryField, value: i32 },
}

/// Dernière configuration stable observée : c'est elle qui est restaurée
/// à la fin d'un override.
///
/// Valeurs usine tant qu'aucune télémétrie n'est arrivée (chauffage actif,
/// mode 9, vitesse 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSnapshot {
    pub heating: Heating,
    pub mode: i32,
    pub speed: FanSpeed,
}

impl Default for DeviceSnapshot {
    fn default() -> Self {
        Self {
            heating: Heating::On,
            mode: 9,
            speed: FanSpeed::Low,
        }
    }
}

impl DeviceSnapshot {
    /// Applique une valeur de télémétrie ; en cas d'erreur le snapshot est inchangé.
    pub fn apply(&mut self, field: TelemetryField, payload: &str) -> Result<(), TelemetryError> {
        let value: i32 = payload.trim().parse().map_err(|_| TelemetryError::NotAnInteger {
            field,
            payload: payload.to_string(),
        })?;

        match field {
            TelemetryField::Heating => self.heating = Heating::try_from(value)?,
            TelemetryField::Mode => self.mode = value,
            TelemetryField::Speed => self.speed = FanSpeed::try_from(value)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_updates_single_field() {
        let mut snap = DeviceSnapshot::default();
        snap.apply(TelemetryField::Speed, "2").unwrap();
        snap.apply(TelemetryField::Heating, "0\n").unwrap();
        snap.apply(TelemetryField::Mode, "3").unwrap();

        assert_eq!(
            snap,
            DeviceSnapshot { heating: Heating::Off, mode: 3, speed: FanSpeed::High }
        );
    }

    #[test]
    fn test_malformed_telemetry_leaves_snapshot_untouched() {
        let mut snap = DeviceSnapshot::default();

        assert!(matches!(
            snap.apply(TelemetryField::Speed, "fast"),
            Err(TelemetryError::NotAnInteger { .. })
        ));
        assert_eq!(
            snap.apply(TelemetryField::Speed, "3"),
            Err(TelemetryError::OutOfRange { field: TelemetryField::Speed, value: 3 })
        );
        assert_eq!(
            snap.apply(TelemetryField::Heating, "7"),
            Err(TelemetryError::OutOfRange { field: TelemetryField::Heating, value: 7 })
        );
        assert_eq!(snap, DeviceSnapshot::default());
    }
}
