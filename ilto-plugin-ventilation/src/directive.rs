use crate::device::{FanSpeed, Heating};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideKind {
    Ventilation,
    Boost,
}

impl OverrideKind {
    fn letter(self) -> char {
        match self {
            OverrideKind::Ventilation => 'V',
            OverrideKind::Boost => 'B',
        }
    }
}

/// Paramètre unique piloté par une commande manuelle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualParam {
    /// `L` : chauffage
    Heating,
    /// `T` : régulation de température (mode)
    Mode,
    /// `S` : vitesse
    Speed,
}

impl ManualParam {
    fn letter(self) -> char {
        match self {
            ManualParam::Heating => 'L',
            ManualParam::Mode => 'T',
            ManualParam::Speed => 'S',
        }
    }
}

/// Directive du topic `control` : une lettre + un entier (`V300`, `S2`),
/// ou `GG` pour demander au Device Bridge un rafraîchissement d'état.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Override { kind: OverrideKind, deciseconds: u32 },
    Manual { param: ManualParam, value: i32 },
    Refresh,
}

impl Directive {
    /// Arrêt de l'override côté appareil.
    pub fn stop() -> Self {
        Directive::Override {
            kind: OverrideKind::Ventilation,
            deciseconds: 0,
        }
    }

    pub fn heating(heating: Heating) -> Self {
        Directive::Manual {
            param: ManualParam::Heating,
            value: heating as i32,
        }
    }

    pub fn mode(mode: i32) -> Self {
        Directive::Manual {
            param: ManualParam::Mode,
            value: mode,
        }
    }

    pub fn speed(speed: FanSpeed) -> Self {
        Directive::Manual {
            param: ManualParam::Speed,
            value: speed as i32,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DirectiveError {
    #[error("empty directive")]
    Empty,
    #[error("unknown directive {0:?}")]
    Unknown(String),
    #[error("malformed argument in {0:?}")]
    Malformed(String),
}

impl FromStr for Directive {
    type Err = DirectiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut chars = s.chars();
        let letter = chars.next().ok_or(DirectiveError::Empty)?;
        let arg = chars.as_str();

        let kind = match letter {
            'V' => Some(OverrideKind::Ventilation),
            'B' => Some(OverrideKind::Boost),
            _ => None,
        };
        if let Some(kind) = kind {
            let deciseconds = arg
                .parse::<u32>()
                .map_err(|_| DirectiveError::Malformed(s.to_string()))?;
            return Ok(Directive::Override { kind, deciseconds });
        }

        let param = match letter {
            'L' => ManualParam::Heating,
            'T' => ManualParam::Mode,
            'S' => ManualParam::Speed,
            'G' if arg == "G" => return Ok(Directive::Refresh),
            _ => return Err(DirectiveError::Unknown(s.to_string())),
        };
        let value = arg
            .parse::<i32>()
            .map_err(|_| DirectiveError::Malformed(s.to_string()))?;
        Ok(Directive::Manual { param, value })
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Override { kind, deciseconds } => write!(f, "{}{}", kind.letter(), deciseconds),
            Directive::Manual { param, value } => write!(f, "{}{}", param.letter(), value),
            Directive::Refresh => f.write_str("GG"),
        }
    }
}
