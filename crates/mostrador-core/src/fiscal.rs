//! # Fiscal Module
//!
//! Argentine fiscal rules: tax conditions, ARCA voucher types, voucher
//! numbering and the organization's fiscal configuration.
//!
//! ## Which voucher does a sale get?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Invoicing disabled or non-fiscal terminal ──► Comprobante interno (X)  │
//! │                                                                         │
//! │  Issuer                 Customer                    Voucher             │
//! │  ──────                 ────────                    ───────             │
//! │  Responsable Inscripto  Responsable Inscripto   ──► Factura A           │
//! │  Responsable Inscripto  Monotributo             ──► Factura A           │
//! │  Responsable Inscripto  Exento / Cons. Final    ──► Factura B           │
//! │  Monotributo / Exento   anyone                  ──► Factura C           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::pricing::{PricingPolicy, TaxMode};
use crate::types::Customer;
use crate::validation::validate_cuit;

/// Largest point-of-sale number ARCA accepts.
pub const MAX_POINT_OF_SALE: i64 = 99_999;

/// Largest voucher sequence number (8 digits).
pub const MAX_VOUCHER_NUMBER: i64 = 99_999_999;

// =============================================================================
// Tax Condition
// =============================================================================

/// IVA registration status of a taxpayer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TaxCondition {
    ResponsableInscripto,
    Monotributo,
    Exento,
    #[default]
    ConsumidorFinal,
}

impl TaxCondition {
    pub fn label(&self) -> &'static str {
        match self {
            TaxCondition::ResponsableInscripto => "IVA Responsable Inscripto",
            TaxCondition::Monotributo => "Responsable Monotributo",
            TaxCondition::Exento => "IVA Sujeto Exento",
            TaxCondition::ConsumidorFinal => "Consumidor Final",
        }
    }

    /// Only registered IVA taxpayers itemize IVA on what they sell.
    #[inline]
    pub fn discriminates_iva(&self) -> bool {
        matches!(self, TaxCondition::ResponsableInscripto)
    }
}

// =============================================================================
// Voucher Type
// =============================================================================

/// Document categories the system issues or records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum VoucherType {
    FacturaA,
    FacturaB,
    FacturaC,
    NotaDebitoA,
    NotaDebitoB,
    NotaDebitoC,
    NotaCreditoA,
    NotaCreditoB,
    NotaCreditoC,
    /// Payment receipt.
    Recibo,
    /// Quote, not a fiscal document.
    Presupuesto,
    /// Inter-location transfer note.
    Remito,
    /// Non-fiscal sale receipt.
    ComprobanteInterno,
}

impl VoucherType {
    /// All variants, in display order.
    pub const ALL: [VoucherType; 13] = [
        VoucherType::FacturaA,
        VoucherType::FacturaB,
        VoucherType::FacturaC,
        VoucherType::NotaDebitoA,
        VoucherType::NotaDebitoB,
        VoucherType::NotaDebitoC,
        VoucherType::NotaCreditoA,
        VoucherType::NotaCreditoB,
        VoucherType::NotaCreditoC,
        VoucherType::Recibo,
        VoucherType::Presupuesto,
        VoucherType::Remito,
        VoucherType::ComprobanteInterno,
    ];

    /// ARCA voucher code, for fiscal documents only.
    pub fn arca_code(&self) -> Option<u16> {
        match self {
            VoucherType::FacturaA => Some(1),
            VoucherType::NotaDebitoA => Some(2),
            VoucherType::NotaCreditoA => Some(3),
            VoucherType::FacturaB => Some(6),
            VoucherType::NotaDebitoB => Some(7),
            VoucherType::NotaCreditoB => Some(8),
            VoucherType::FacturaC => Some(11),
            VoucherType::NotaDebitoC => Some(12),
            VoucherType::NotaCreditoC => Some(13),
            VoucherType::Remito => Some(91),
            VoucherType::Recibo | VoucherType::Presupuesto | VoucherType::ComprobanteInterno => None,
        }
    }

    /// Letter printed in the voucher header box.
    pub fn letter(&self) -> char {
        match self {
            VoucherType::FacturaA | VoucherType::NotaDebitoA | VoucherType::NotaCreditoA => 'A',
            VoucherType::FacturaB | VoucherType::NotaDebitoB | VoucherType::NotaCreditoB => 'B',
            VoucherType::FacturaC | VoucherType::NotaDebitoC | VoucherType::NotaCreditoC => 'C',
            VoucherType::Remito => 'R',
            VoucherType::Recibo | VoucherType::Presupuesto | VoucherType::ComprobanteInterno => 'X',
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VoucherType::FacturaA => "Factura A",
            VoucherType::FacturaB => "Factura B",
            VoucherType::FacturaC => "Factura C",
            VoucherType::NotaDebitoA => "Nota de Débito A",
            VoucherType::NotaDebitoB => "Nota de Débito B",
            VoucherType::NotaDebitoC => "Nota de Débito C",
            VoucherType::NotaCreditoA => "Nota de Crédito A",
            VoucherType::NotaCreditoB => "Nota de Crédito B",
            VoucherType::NotaCreditoC => "Nota de Crédito C",
            VoucherType::Recibo => "Recibo",
            VoucherType::Presupuesto => "Presupuesto",
            VoucherType::Remito => "Remito",
            VoucherType::ComprobanteInterno => "Comprobante interno",
        }
    }

    #[inline]
    pub fn is_fiscal(&self) -> bool {
        self.arca_code().is_some()
    }

    /// Type A vouchers show IVA as a separate line.
    #[inline]
    pub fn discriminates_iva(&self) -> bool {
        self.letter() == 'A'
    }

    /// Vouchers that carry a tax-credit for the buyer in a purchase.
    pub fn is_invoice_like(&self) -> bool {
        matches!(
            self,
            VoucherType::FacturaA
                | VoucherType::FacturaB
                | VoucherType::FacturaC
                | VoucherType::NotaDebitoA
                | VoucherType::NotaDebitoB
                | VoucherType::NotaDebitoC
                | VoucherType::ComprobanteInterno
        )
    }

    #[inline]
    pub fn is_credit_note(&self) -> bool {
        matches!(
            self,
            VoucherType::NotaCreditoA | VoucherType::NotaCreditoB | VoucherType::NotaCreditoC
        )
    }

    /// The credit note that annuls this voucher.
    ///
    /// ## Example
    /// ```rust
    /// use mostrador_core::fiscal::VoucherType;
    ///
    /// assert_eq!(VoucherType::FacturaB.credit_note(), Some(VoucherType::NotaCreditoB));
    /// assert_eq!(VoucherType::Presupuesto.credit_note(), None);
    /// ```
    pub fn credit_note(&self) -> Option<VoucherType> {
        match self {
            VoucherType::FacturaA | VoucherType::NotaDebitoA => Some(VoucherType::NotaCreditoA),
            VoucherType::FacturaB | VoucherType::NotaDebitoB => Some(VoucherType::NotaCreditoB),
            VoucherType::FacturaC | VoucherType::NotaDebitoC => Some(VoucherType::NotaCreditoC),
            _ => None,
        }
    }

    /// Stable identifier (same as serde/sqlx representation).
    pub fn as_str(&self) -> &'static str {
        match self {
            VoucherType::FacturaA => "factura_a",
            VoucherType::FacturaB => "factura_b",
            VoucherType::FacturaC => "factura_c",
            VoucherType::NotaDebitoA => "nota_debito_a",
            VoucherType::NotaDebitoB => "nota_debito_b",
            VoucherType::NotaDebitoC => "nota_debito_c",
            VoucherType::NotaCreditoA => "nota_credito_a",
            VoucherType::NotaCreditoB => "nota_credito_b",
            VoucherType::NotaCreditoC => "nota_credito_c",
            VoucherType::Recibo => "recibo",
            VoucherType::Presupuesto => "presupuesto",
            VoucherType::Remito => "remito",
            VoucherType::ComprobanteInterno => "comprobante_interno",
        }
    }
}

impl fmt::Display for VoucherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for VoucherType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VoucherType::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "voucher_type".to_string(),
                allowed: VoucherType::ALL.iter().map(|v| v.as_str().to_string()).collect(),
            })
    }
}

// =============================================================================
// Voucher Number
// =============================================================================

/// Point of sale + sequence, printed as `PPPPP-NNNNNNNN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VoucherNumber {
    pub point_of_sale: i64,
    pub number: i64,
}

impl VoucherNumber {
    pub const fn new(point_of_sale: i64, number: i64) -> Self {
        VoucherNumber {
            point_of_sale,
            number,
        }
    }

    /// First number issued at a point of sale.
    pub const fn first(point_of_sale: i64) -> Self {
        VoucherNumber::new(point_of_sale, 1)
    }

    /// The number that follows this one at the same point of sale.
    ///
    /// ## Example
    /// ```rust
    /// use mostrador_core::fiscal::VoucherNumber;
    ///
    /// let next = VoucherNumber::new(3, 41).next().unwrap();
    /// assert_eq!(next.to_string(), "00003-00000042");
    /// ```
    pub fn next(&self) -> CoreResult<Self> {
        if self.number >= MAX_VOUCHER_NUMBER {
            return Err(ValidationError::OutOfRange {
                field: "voucher number".to_string(),
                min: 1,
                max: MAX_VOUCHER_NUMBER,
            }
            .into());
        }
        Ok(VoucherNumber::new(self.point_of_sale, self.number + 1))
    }
}

impl fmt::Display for VoucherNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:05}-{:08}", self.point_of_sale, self.number)
    }
}

impl FromStr for VoucherNumber {
    type Err = ValidationError;

    /// Parses `3-42`, `0003-00000042` or `00003-00000042`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "voucher number".to_string(),
            reason: reason.to_string(),
        };

        let (pos, number) = s.trim().split_once('-').ok_or_else(|| invalid("expected PPPPP-NNNNNNNN"))?;
        let pos: i64 = pos.parse().map_err(|_| invalid("point of sale is not a number"))?;
        let number: i64 = number.parse().map_err(|_| invalid("number is not a number"))?;

        if !(1..=MAX_POINT_OF_SALE).contains(&pos) {
            return Err(invalid("point of sale out of range"));
        }
        if !(1..=MAX_VOUCHER_NUMBER).contains(&number) {
            return Err(invalid("number out of range"));
        }

        Ok(VoucherNumber::new(pos, number))
    }
}

// =============================================================================
// Fiscal Configuration
// =============================================================================

/// The organization's fiscal identity and billing preferences.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct FiscalConfig {
    pub organization_id: String,
    pub legal_name: String,
    pub cuit: String,
    pub tax_condition: TaxCondition,
    /// Ingresos Brutos registration.
    pub gross_income_number: Option<String>,
    #[ts(as = "Option<String>")]
    pub activity_start_date: Option<NaiveDate>,
    /// When false every sale gets a non-fiscal internal receipt.
    pub invoicing_enabled: bool,
    pub default_point_of_sale_id: Option<String>,
    pub tax_mode: TaxMode,
    /// Cap for the cart-wide discount, in basis points.
    pub max_global_discount_bps: u32,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl FiscalConfig {
    /// Pricing rules implied by this configuration.
    pub fn pricing_policy(&self) -> PricingPolicy {
        PricingPolicy {
            tax_mode: self.tax_mode,
            max_global_discount_bps: self.max_global_discount_bps,
            charges_iva: self.tax_condition.discriminates_iva(),
        }
    }

    /// Validates the form fields before saving.
    pub fn validate(&self) -> CoreResult<()> {
        if self.legal_name.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "legal_name".to_string(),
            }
            .into());
        }
        validate_cuit(&self.cuit)?;
        if self.tax_condition == TaxCondition::ConsumidorFinal {
            return Err(ValidationError::NotAllowed {
                field: "tax_condition".to_string(),
                allowed: vec![
                    "responsable_inscripto".to_string(),
                    "monotributo".to_string(),
                    "exento".to_string(),
                ],
            }
            .into());
        }
        crate::validation::validate_discount_bps(self.max_global_discount_bps)?;
        Ok(())
    }
}

// =============================================================================
// Voucher Selection
// =============================================================================

/// Picks the voucher type for a sale.
///
/// ## Arguments
/// * `issuer` - The organization's fiscal configuration
/// * `fiscal_terminal` - Whether the point of sale is registered with ARCA
/// * `customer` - Tax condition of the identified customer, if any
///
/// ## Example
/// ```rust,ignore
/// let voucher = select_sale_voucher(&config, true, Some(TaxCondition::Monotributo));
/// assert_eq!(voucher, VoucherType::FacturaA);
/// ```
pub fn select_sale_voucher(
    issuer: &FiscalConfig,
    fiscal_terminal: bool,
    customer: Option<TaxCondition>,
) -> VoucherType {
    if !issuer.invoicing_enabled || !fiscal_terminal {
        return VoucherType::ComprobanteInterno;
    }

    match issuer.tax_condition {
        TaxCondition::ResponsableInscripto => match customer {
            Some(TaxCondition::ResponsableInscripto) | Some(TaxCondition::Monotributo) => {
                VoucherType::FacturaA
            }
            _ => VoucherType::FacturaB,
        },
        TaxCondition::Monotributo | TaxCondition::Exento => VoucherType::FacturaC,
        TaxCondition::ConsumidorFinal => VoucherType::ComprobanteInterno,
    }
}

/// Checks that the customer fits the voucher.
///
/// Type A vouchers must name a customer with a valid CUIT.
pub fn check_customer_requirements(voucher: VoucherType, customer: Option<&Customer>) -> CoreResult<()> {
    if voucher.letter() != 'A' {
        return Ok(());
    }

    let has_valid_cuit = customer
        .and_then(|c| c.cuit.as_deref())
        .map(|cuit| validate_cuit(cuit).is_ok())
        .unwrap_or(false);

    if !has_valid_cuit {
        return Err(CoreError::CustomerRequired {
            voucher: voucher.label().to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_ORGANIZATION_ID;

    fn config(condition: TaxCondition, enabled: bool) -> FiscalConfig {
        FiscalConfig {
            organization_id: DEFAULT_ORGANIZATION_ID.to_string(),
            legal_name: "Almacén Don Pepe SRL".to_string(),
            cuit: "30-71234567-1".to_string(),
            tax_condition: condition,
            gross_income_number: None,
            activity_start_date: None,
            invoicing_enabled: enabled,
            default_point_of_sale_id: None,
            tax_mode: TaxMode::Inclusive,
            max_global_discount_bps: 2000,
            updated_at: Utc::now(),
        }
    }

    fn customer(cuit: Option<&str>) -> Customer {
        Customer {
            id: "c1".to_string(),
            organization_id: DEFAULT_ORGANIZATION_ID.to_string(),
            name: "Kiosco Central".to_string(),
            cuit: cuit.map(str::to_string),
            tax_condition: TaxCondition::ResponsableInscripto,
            email: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_voucher_selection_table() {
        let ri = config(TaxCondition::ResponsableInscripto, true);
        assert_eq!(
            select_sale_voucher(&ri, true, Some(TaxCondition::ResponsableInscripto)),
            VoucherType::FacturaA
        );
        assert_eq!(
            select_sale_voucher(&ri, true, Some(TaxCondition::Monotributo)),
            VoucherType::FacturaA
        );
        assert_eq!(
            select_sale_voucher(&ri, true, Some(TaxCondition::ConsumidorFinal)),
            VoucherType::FacturaB
        );
        assert_eq!(select_sale_voucher(&ri, true, None), VoucherType::FacturaB);

        let mono = config(TaxCondition::Monotributo, true);
        assert_eq!(
            select_sale_voucher(&mono, true, Some(TaxCondition::ResponsableInscripto)),
            VoucherType::FacturaC
        );
    }

    #[test]
    fn test_internal_receipt_when_not_fiscal() {
        let disabled = config(TaxCondition::ResponsableInscripto, false);
        assert_eq!(select_sale_voucher(&disabled, true, None), VoucherType::ComprobanteInterno);

        let enabled = config(TaxCondition::ResponsableInscripto, true);
        assert_eq!(select_sale_voucher(&enabled, false, None), VoucherType::ComprobanteInterno);
    }

    #[test]
    fn test_factura_a_requires_cuit() {
        assert!(check_customer_requirements(VoucherType::FacturaA, None).is_err());
        assert!(check_customer_requirements(VoucherType::FacturaA, Some(&customer(None))).is_err());
        assert!(check_customer_requirements(
            VoucherType::FacturaA,
            Some(&customer(Some("20-12345678-6")))
        )
        .is_ok());
        assert!(check_customer_requirements(VoucherType::FacturaB, None).is_ok());
    }

    #[test]
    fn test_voucher_number_format_and_parse() {
        let n = VoucherNumber::new(3, 42);
        assert_eq!(n.to_string(), "00003-00000042");
        assert_eq!("0003-00000042".parse::<VoucherNumber>().unwrap(), n);
        assert!("3".parse::<VoucherNumber>().is_err());
        assert!("0-1".parse::<VoucherNumber>().is_err());
        assert!(VoucherNumber::new(1, MAX_VOUCHER_NUMBER).next().is_err());
    }

    #[test]
    fn test_voucher_type_codes_and_letters() {
        assert_eq!(VoucherType::FacturaB.arca_code(), Some(6));
        assert_eq!(VoucherType::NotaCreditoC.arca_code(), Some(13));
        assert_eq!(VoucherType::ComprobanteInterno.letter(), 'X');
        assert!(VoucherType::FacturaA.discriminates_iva());
        assert!(!VoucherType::FacturaB.discriminates_iva());
        assert_eq!("factura_c".parse::<VoucherType>().unwrap(), VoucherType::FacturaC);
        assert!("factura_z".parse::<VoucherType>().is_err());
    }

    #[test]
    fn test_fiscal_config_validation() {
        assert!(config(TaxCondition::ResponsableInscripto, true).validate().is_ok());

        let mut bad_cuit = config(TaxCondition::ResponsableInscripto, true);
        bad_cuit.cuit = "30-71234567-2".to_string();
        assert!(bad_cuit.validate().is_err());

        let consumer = config(TaxCondition::ConsumidorFinal, true);
        assert!(consumer.validate().is_err());
    }

    #[test]
    fn test_pricing_policy_follows_tax_condition() {
        assert!(config(TaxCondition::ResponsableInscripto, true).pricing_policy().charges_iva);
        assert!(!config(TaxCondition::Monotributo, true).pricing_policy().charges_iva);
    }
}
