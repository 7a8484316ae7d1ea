//! CRED checkup catalog.
//!
//! The national well-child programme defines 33 controls between birth and five years of
//! age. Each control has a fixed day offset from the birth date; "months" in the labels are
//! 30-day blocks, not calendar months.

use serde::Serialize;
use utoipa::ToSchema;

use crate::constants::CATALOG_SIZE;

/// Life-stage phase a control belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// First month of life (newborn controls).
    Neonatal,
    /// 1 to 11 months.
    Infant,
    /// 12 to 35 months.
    Toddler,
    /// 36 to 59 months.
    Preschool,
    /// Five years and older. No control in the current catalog falls here.
    School,
}

/// One expected checkup in the CRED programme.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct CheckupDefinition {
    /// Position in the schedule, dense from 1.
    pub control_number: u32,
    pub label: &'static str,
    /// Offset from the birth date, in days.
    pub target_age_days: u32,
    /// Age-group heading used when grouping controls in a matrix.
    pub age_group: &'static str,
    pub phase: Phase,
}

const fn control(
    control_number: u32,
    label: &'static str,
    target_age_days: u32,
    age_group: &'static str,
    phase: Phase,
) -> CheckupDefinition {
    CheckupDefinition {
        control_number,
        label,
        target_age_days,
        age_group,
        phase,
    }
}

const NEWBORN: &str = "Recién nacido";
const UNDER_ONE: &str = "0-11 meses";
const ONE_YEAR: &str = "12-23 meses";
const TWO_YEARS: &str = "24-35 meses";
const THREE_YEARS: &str = "36-47 meses";
const FOUR_YEARS: &str = "48-59 meses";

static CATALOG: [CheckupDefinition; CATALOG_SIZE] = [
    control(1, "RN 48 horas", 2, NEWBORN, Phase::Neonatal),
    control(2, "RN 7 días", 7, NEWBORN, Phase::Neonatal),
    control(3, "RN 14 días", 14, NEWBORN, Phase::Neonatal),
    control(4, "RN 21 días", 21, NEWBORN, Phase::Neonatal),
    control(5, "1 mes", 30, UNDER_ONE, Phase::Infant),
    control(6, "2 meses", 60, UNDER_ONE, Phase::Infant),
    control(7, "3 meses", 90, UNDER_ONE, Phase::Infant),
    control(8, "4 meses", 120, UNDER_ONE, Phase::Infant),
    control(9, "5 meses", 150, UNDER_ONE, Phase::Infant),
    control(10, "6 meses", 180, UNDER_ONE, Phase::Infant),
    control(11, "7 meses", 210, UNDER_ONE, Phase::Infant),
    control(12, "8 meses", 240, UNDER_ONE, Phase::Infant),
    control(13, "9 meses", 270, UNDER_ONE, Phase::Infant),
    control(14, "10 meses", 300, UNDER_ONE, Phase::Infant),
    control(15, "11 meses", 330, UNDER_ONE, Phase::Infant),
    control(16, "12 meses", 360, ONE_YEAR, Phase::Toddler),
    control(17, "14 meses", 420, ONE_YEAR, Phase::Toddler),
    control(18, "16 meses", 480, ONE_YEAR, Phase::Toddler),
    control(19, "18 meses", 540, ONE_YEAR, Phase::Toddler),
    control(20, "20 meses", 600, ONE_YEAR, Phase::Toddler),
    control(21, "22 meses", 660, ONE_YEAR, Phase::Toddler),
    control(22, "24 meses", 720, TWO_YEARS, Phase::Toddler),
    control(23, "27 meses", 810, TWO_YEARS, Phase::Toddler),
    control(24, "30 meses", 900, TWO_YEARS, Phase::Toddler),
    control(25, "33 meses", 990, TWO_YEARS, Phase::Toddler),
    control(26, "36 meses", 1080, THREE_YEARS, Phase::Preschool),
    control(27, "39 meses", 1170, THREE_YEARS, Phase::Preschool),
    control(28, "42 meses", 1260, THREE_YEARS, Phase::Preschool),
    control(29, "45 meses", 1350, THREE_YEARS, Phase::Preschool),
    control(30, "48 meses", 1440, FOUR_YEARS, Phase::Preschool),
    control(31, "51 meses", 1530, FOUR_YEARS, Phase::Preschool),
    control(32, "54 meses", 1620, FOUR_YEARS, Phase::Preschool),
    control(33, "57 meses", 1710, FOUR_YEARS, Phase::Preschool),
];

/// Returns the CRED checkup definitions in control-number order.
pub fn checkup_definitions() -> &'static [CheckupDefinition] {
    &CATALOG
}

/// Looks up a single definition by its control number.
pub fn definition(control_number: u32) -> Option<&'static CheckupDefinition> {
    CATALOG
        .iter()
        .find(|def| def.control_number == control_number)
}
