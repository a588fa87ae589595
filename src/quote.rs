// 🧾 Configuration Aggregator - Price a customer's build
//
// Pure arithmetic over already-loaded records; storage only enters through
// the quote_vehicle wrapper at the bottom. The quote page restricts choices
// to the trim's eligibility sets before calling, but the aggregator
// re-checks everything — a stale page must not produce a wrong quote.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db;
use crate::entities::{Color, ColorKind, OptionItem, Trim, TrimColor, TrimOption, Vehicle};
use crate::error::{CatalogError, Result};
use crate::pricing::RateQuote;

// ============================================================================
// QUOTE INPUT
// ============================================================================

/// Everything the aggregator needs, already loaded by the caller.
pub struct QuoteInput<'a> {
    pub vehicle: &'a Vehicle,
    pub trim: Option<TrimSelection<'a>>,
    pub exterior: Option<&'a Color>,
    pub interior: Option<&'a Color>,
    pub options: Vec<&'a OptionItem>,
    /// Contract period in months.
    pub period: u32,
    /// Deposit ratio in percent.
    pub deposit_ratio: u32,
}

/// A trim together with its eligibility wiring.
pub struct TrimSelection<'a> {
    pub trim: &'a Trim,
    pub eligible_colors: &'a [TrimColor],
    pub eligible_options: &'a [TrimOption],
}

// ============================================================================
// PRICE BREAKDOWN
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub vehicle_id: String,
    pub trim_id: Option<String>,
    pub period: u32,
    pub deposit_ratio: u32,

    pub base_price: i64,
    pub trim_price: i64,
    pub exterior_price: i64,
    pub interior_price: i64,
    pub options_price: i64,
    pub total_price: i64,

    /// floor(total_price × deposit_ratio / 100)
    pub deposit_amount: i64,

    /// None when the rate matrix has no usable cell at these terms.
    pub monthly_payment: Option<i64>,

    /// Rendered as "monthly rate on consultation" by the storefront.
    pub consult_required: bool,
}

impl PriceBreakdown {
    pub fn summary(&self) -> String {
        match self.monthly_payment {
            Some(monthly) => format!(
                "Total {} over {} months at {}% deposit: {} down, {} / month",
                self.total_price, self.period, self.deposit_ratio, self.deposit_amount, monthly
            ),
            None => format!(
                "Total {} over {} months at {}% deposit: {} down, monthly rate on consultation",
                self.total_price, self.period, self.deposit_ratio, self.deposit_amount
            ),
        }
    }
}

// ============================================================================
// AGGREGATION
// ============================================================================

/// Price a configuration. Total = base + trim + exterior + interior +
/// Σ selected options; unselected options contribute nothing, whatever
/// their `included` flag says. An unavailable monthly rate is a valid
/// terminal state, not an error.
pub fn build_quote(input: &QuoteInput) -> Result<PriceBreakdown> {
    if input.deposit_ratio > 100 {
        return Err(CatalogError::InvalidRequest(format!(
            "deposit ratio {}% exceeds 100%",
            input.deposit_ratio
        )));
    }

    let vehicle = input.vehicle;

    if let Some(selection) = &input.trim {
        if selection.trim.vehicle_id != vehicle.id {
            return Err(CatalogError::IneligibleSelection(format!(
                "trim '{}' belongs to another vehicle",
                selection.trim.name
            )));
        }
    }

    if let Some(color) = input.exterior {
        check_color(vehicle, input.trim.as_ref(), color, ColorKind::Exterior)?;
    }
    if let Some(color) = input.interior {
        check_color(vehicle, input.trim.as_ref(), color, ColorKind::Interior)?;
    }

    let mut options_price = 0i64;
    for option in &input.options {
        if option.vehicle_id != vehicle.id {
            return Err(CatalogError::IneligibleSelection(format!(
                "option '{}' belongs to another vehicle",
                option.name
            )));
        }
        let effective = match &input.trim {
            Some(selection) => {
                let link = selection
                    .eligible_options
                    .iter()
                    .find(|link| link.option_id == option.id)
                    .ok_or_else(|| {
                        CatalogError::IneligibleSelection(format!(
                            "option '{}' is not offered with trim '{}'",
                            option.name, selection.trim.name
                        ))
                    })?;
                link.effective_price(option)
            }
            None => option.price,
        };
        options_price += effective;
    }

    let trim_price = input.trim.as_ref().map(|s| s.trim.price).unwrap_or(0);
    let exterior_price = input.exterior.map(|c| c.price).unwrap_or(0);
    let interior_price = input.interior.map(|c| c.price).unwrap_or(0);

    let total_price =
        vehicle.base_price + trim_price + exterior_price + interior_price + options_price;
    let deposit_amount = total_price * i64::from(input.deposit_ratio) / 100;

    let monthly_payment = match vehicle.rates.resolve(input.period, input.deposit_ratio) {
        RateQuote::Monthly(amount) => Some(amount),
        RateQuote::Unavailable => None,
    };

    Ok(PriceBreakdown {
        vehicle_id: vehicle.id.clone(),
        trim_id: input.trim.as_ref().map(|s| s.trim.id.clone()),
        period: input.period,
        deposit_ratio: input.deposit_ratio,
        base_price: vehicle.base_price,
        trim_price,
        exterior_price,
        interior_price,
        options_price,
        total_price,
        deposit_amount,
        consult_required: monthly_payment.is_none(),
        monthly_payment,
    })
}

fn check_color(
    vehicle: &Vehicle,
    selection: Option<&TrimSelection>,
    color: &Color,
    expected: ColorKind,
) -> Result<()> {
    if color.vehicle_id != vehicle.id {
        return Err(CatalogError::IneligibleSelection(format!(
            "color '{}' belongs to another vehicle",
            color.name
        )));
    }
    if color.kind != expected {
        return Err(CatalogError::IneligibleSelection(format!(
            "color '{}' is {} but was selected as {}",
            color.name,
            color.kind.as_str(),
            expected.as_str()
        )));
    }
    if let Some(selection) = selection {
        let eligible = selection
            .eligible_colors
            .iter()
            .any(|link| link.color_id == color.id);
        if !eligible {
            return Err(CatalogError::IneligibleSelection(format!(
                "color '{}' is not offered with trim '{}'",
                color.name, selection.trim.name
            )));
        }
    }
    Ok(())
}

// ============================================================================
// STORE-COMPOSED QUOTING
// ============================================================================

/// Ids-in variant used by the CLI and the API server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub vehicle_id: String,
    #[serde(default)]
    pub trim_id: Option<String>,
    #[serde(default)]
    pub exterior_color_id: Option<String>,
    #[serde(default)]
    pub interior_color_id: Option<String>,
    #[serde(default)]
    pub option_ids: Vec<String>,
    pub period: u32,
    pub deposit_ratio: u32,
}

/// Load every referenced record, then run the pure aggregator over it.
/// Unknown ids surface as NotFound before any arithmetic happens.
pub fn quote_vehicle(conn: &Connection, request: &QuoteRequest) -> Result<PriceBreakdown> {
    let vehicle = db::get_vehicle(conn, &request.vehicle_id)?;

    let trim_parts = match &request.trim_id {
        Some(trim_id) => {
            let trim = db::get_trim(conn, trim_id)?;
            let colors = db::trim_color_links(conn, trim_id)?;
            let options = db::trim_option_links(conn, trim_id)?;
            Some((trim, colors, options))
        }
        None => None,
    };

    let exterior = match &request.exterior_color_id {
        Some(id) => Some(db::get_color(conn, id)?),
        None => None,
    };
    let interior = match &request.interior_color_id {
        Some(id) => Some(db::get_color(conn, id)?),
        None => None,
    };

    let mut options = Vec::with_capacity(request.option_ids.len());
    for id in &request.option_ids {
        options.push(db::get_option(conn, id)?);
    }

    let input = QuoteInput {
        vehicle: &vehicle,
        trim: trim_parts.as_ref().map(|(trim, colors, option_links)| TrimSelection {
            trim,
            eligible_colors: colors,
            eligible_options: option_links,
        }),
        exterior: exterior.as_ref(),
        interior: interior.as_ref(),
        options: options.iter().collect(),
        period: request.period,
        deposit_ratio: request.deposit_ratio,
    };

    build_quote(&input)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_vehicle() -> Vehicle {
        let mut vehicle = Vehicle::new("brand-1", "Avante", 30_000_000);
        vehicle.rates.set(60, 0, 450_000);
        vehicle.rates.set(48, 30, 390_000);
        vehicle
    }

    struct Fixture {
        vehicle: Vehicle,
        trim: Trim,
        exterior: Color,
        interior: Color,
        sunroof: OptionItem,
        audio: OptionItem,
        color_links: Vec<TrimColor>,
        option_links: Vec<TrimOption>,
    }

    /// Vehicle with one trim eligible for everything.
    fn create_test_fixture() -> Fixture {
        let vehicle = create_test_vehicle();
        let trim = Trim::new(&vehicle.id, "Premium", 1_000_000);

        let exterior = Color::new(&vehicle.id, ColorKind::Exterior, "Pearl White", 300_000);
        let interior = Color::new(&vehicle.id, ColorKind::Interior, "Black Leather", 0);
        let sunroof = OptionItem::new(&vehicle.id, "Sunroof", 350_000);
        let audio = OptionItem::new(&vehicle.id, "Premium Audio", 150_000);

        let color_links = vec![
            TrimColor::new(&trim.id, &exterior.id),
            TrimColor::new(&trim.id, &interior.id),
        ];
        let option_links = vec![
            TrimOption::new(&trim.id, &sunroof.id),
            TrimOption::new(&trim.id, &audio.id),
        ];

        Fixture {
            vehicle,
            trim,
            exterior,
            interior,
            sunroof,
            audio,
            color_links,
            option_links,
        }
    }

    fn full_input(fixture: &Fixture, period: u32, deposit_ratio: u32) -> QuoteInput<'_> {
        QuoteInput {
            vehicle: &fixture.vehicle,
            trim: Some(TrimSelection {
                trim: &fixture.trim,
                eligible_colors: &fixture.color_links,
                eligible_options: &fixture.option_links,
            }),
            exterior: Some(&fixture.exterior),
            interior: Some(&fixture.interior),
            options: vec![&fixture.sunroof, &fixture.audio],
            period,
            deposit_ratio,
        }
    }

    #[test]
    fn test_full_configuration_totals() {
        let fixture = create_test_fixture();
        let breakdown = build_quote(&full_input(&fixture, 60, 0)).unwrap();

        // 30,000,000 + 1,000,000 + 300,000 + 0 + (350,000 + 150,000)
        assert_eq!(breakdown.total_price, 31_800_000);
        assert_eq!(breakdown.base_price, 30_000_000);
        assert_eq!(breakdown.trim_price, 1_000_000);
        assert_eq!(breakdown.exterior_price, 300_000);
        assert_eq!(breakdown.interior_price, 0);
        assert_eq!(breakdown.options_price, 500_000);

        assert_eq!(breakdown.deposit_amount, 0);
        assert_eq!(breakdown.monthly_payment, Some(450_000));
        assert!(!breakdown.consult_required);
    }

    #[test]
    fn test_unavailable_rate_is_not_an_error() {
        let fixture = create_test_fixture();
        let breakdown = build_quote(&full_input(&fixture, 60, 30)).unwrap();

        // Vehicle-price fields are always computable
        assert_eq!(breakdown.total_price, 31_800_000);
        assert_eq!(breakdown.deposit_amount, 9_540_000);
        assert_eq!(breakdown.monthly_payment, None);
        assert!(breakdown.consult_required);
    }

    #[test]
    fn test_vehicle_only_quote() {
        let vehicle = create_test_vehicle();
        let input = QuoteInput {
            vehicle: &vehicle,
            trim: None,
            exterior: None,
            interior: None,
            options: vec![],
            period: 48,
            deposit_ratio: 30,
        };

        let breakdown = build_quote(&input).unwrap();
        assert_eq!(breakdown.total_price, 30_000_000);
        assert_eq!(breakdown.trim_id, None);
        assert_eq!(breakdown.deposit_amount, 9_000_000);
        assert_eq!(breakdown.monthly_payment, Some(390_000));
    }

    #[test]
    fn test_omitting_a_selection_never_increases_total() {
        let fixture = create_test_fixture();
        let full = build_quote(&full_input(&fixture, 60, 0)).unwrap();

        let mut without_sunroof = full_input(&fixture, 60, 0);
        without_sunroof.options = vec![&fixture.audio];
        let reduced = build_quote(&without_sunroof).unwrap();

        assert!(reduced.total_price <= full.total_price);
        assert_eq!(full.total_price - reduced.total_price, 350_000);

        let mut without_exterior = full_input(&fixture, 60, 0);
        without_exterior.exterior = None;
        let no_ext = build_quote(&without_exterior).unwrap();
        assert!(no_ext.total_price <= full.total_price);
    }

    #[test]
    fn test_deposit_floors_toward_zero() {
        let mut vehicle = Vehicle::new("brand-1", "City", 999);
        vehicle.rates.set(24, 33, 10);

        let input = QuoteInput {
            vehicle: &vehicle,
            trim: None,
            exterior: None,
            interior: None,
            options: vec![],
            period: 24,
            deposit_ratio: 33,
        };

        // floor(999 * 33 / 100) = floor(329.67)
        let breakdown = build_quote(&input).unwrap();
        assert_eq!(breakdown.deposit_amount, 329);
    }

    #[test]
    fn test_price_override_applies_only_under_trim() {
        let fixture = create_test_fixture();

        let mut links = fixture.option_links.clone();
        links[0].price_override = Some(100_000); // sunroof discounted

        let input = QuoteInput {
            vehicle: &fixture.vehicle,
            trim: Some(TrimSelection {
                trim: &fixture.trim,
                eligible_colors: &fixture.color_links,
                eligible_options: &links,
            }),
            exterior: None,
            interior: None,
            options: vec![&fixture.sunroof],
            period: 60,
            deposit_ratio: 0,
        };

        let breakdown = build_quote(&input).unwrap();
        assert_eq!(breakdown.options_price, 100_000);

        // Without a trim the option's own price applies
        let bare = QuoteInput {
            vehicle: &fixture.vehicle,
            trim: None,
            exterior: None,
            interior: None,
            options: vec![&fixture.sunroof],
            period: 60,
            deposit_ratio: 0,
        };
        assert_eq!(build_quote(&bare).unwrap().options_price, 350_000);
    }

    #[test]
    fn test_zero_override_means_free_not_inherit() {
        let fixture = create_test_fixture();

        let mut links = fixture.option_links.clone();
        links[0].price_override = Some(0);

        let input = QuoteInput {
            vehicle: &fixture.vehicle,
            trim: Some(TrimSelection {
                trim: &fixture.trim,
                eligible_colors: &fixture.color_links,
                eligible_options: &links,
            }),
            exterior: None,
            interior: None,
            options: vec![&fixture.sunroof],
            period: 60,
            deposit_ratio: 0,
        };

        assert_eq!(build_quote(&input).unwrap().options_price, 0);
    }

    #[test]
    fn test_included_option_prices_only_when_selected() {
        let fixture = create_test_fixture();

        let mut links = fixture.option_links.clone();
        links[1].included = true; // audio preselected in the configurator

        let input = QuoteInput {
            vehicle: &fixture.vehicle,
            trim: Some(TrimSelection {
                trim: &fixture.trim,
                eligible_colors: &fixture.color_links,
                eligible_options: &links,
            }),
            exterior: None,
            interior: None,
            options: vec![], // customer deselected everything
            period: 60,
            deposit_ratio: 0,
        };

        // The flag is UI metadata; an unselected option never bills
        assert_eq!(build_quote(&input).unwrap().options_price, 0);
    }

    #[test]
    fn test_foreign_vehicle_selections_rejected() {
        let fixture = create_test_fixture();
        let stranger = Color::new("other-vehicle", ColorKind::Exterior, "Red", 100_000);

        let mut input = full_input(&fixture, 60, 0);
        input.exterior = Some(&stranger);

        let err = build_quote(&input).unwrap_err();
        assert!(matches!(err, CatalogError::IneligibleSelection(_)));

        let foreign_option = OptionItem::new("other-vehicle", "Spoiler", 90_000);
        let mut input = full_input(&fixture, 60, 0);
        input.options = vec![&foreign_option];
        assert!(matches!(
            build_quote(&input).unwrap_err(),
            CatalogError::IneligibleSelection(_)
        ));
    }

    #[test]
    fn test_color_kind_mismatch_rejected() {
        let fixture = create_test_fixture();

        // Interior color offered in the exterior slot
        let mut input = full_input(&fixture, 60, 0);
        input.exterior = Some(&fixture.interior);

        let err = build_quote(&input).unwrap_err();
        assert!(matches!(err, CatalogError::IneligibleSelection(_)));
    }

    #[test]
    fn test_selection_outside_trim_sets_rejected() {
        let fixture = create_test_fixture();

        // A vehicle color the trim does not offer
        let off_trim = Color::new(&fixture.vehicle.id, ColorKind::Exterior, "Matte Gray", 700_000);
        let mut input = full_input(&fixture, 60, 0);
        input.exterior = Some(&off_trim);
        assert!(matches!(
            build_quote(&input).unwrap_err(),
            CatalogError::IneligibleSelection(_)
        ));

        // Same for options
        let off_trim_option = OptionItem::new(&fixture.vehicle.id, "Tow Hook", 80_000);
        let mut input = full_input(&fixture, 60, 0);
        input.options = vec![&off_trim_option];
        assert!(matches!(
            build_quote(&input).unwrap_err(),
            CatalogError::IneligibleSelection(_)
        ));
    }

    #[test]
    fn test_no_trim_skips_eligibility_checks() {
        let fixture = create_test_fixture();
        let off_trim = Color::new(&fixture.vehicle.id, ColorKind::Exterior, "Matte Gray", 700_000);

        let input = QuoteInput {
            vehicle: &fixture.vehicle,
            trim: None,
            exterior: Some(&off_trim),
            interior: None,
            options: vec![],
            period: 60,
            deposit_ratio: 0,
        };

        // Vehicle scoping still applies, trim eligibility does not
        let breakdown = build_quote(&input).unwrap();
        assert_eq!(breakdown.exterior_price, 700_000);
    }

    #[test]
    fn test_trim_of_another_vehicle_rejected() {
        let fixture = create_test_fixture();
        let foreign_trim = Trim::new("other-vehicle", "Sport", 2_000_000);

        let input = QuoteInput {
            vehicle: &fixture.vehicle,
            trim: Some(TrimSelection {
                trim: &foreign_trim,
                eligible_colors: &[],
                eligible_options: &[],
            }),
            exterior: None,
            interior: None,
            options: vec![],
            period: 60,
            deposit_ratio: 0,
        };

        assert!(matches!(
            build_quote(&input).unwrap_err(),
            CatalogError::IneligibleSelection(_)
        ));
    }

    #[test]
    fn test_deposit_ratio_above_hundred_rejected() {
        let fixture = create_test_fixture();
        let input = full_input(&fixture, 60, 101);

        assert!(matches!(
            build_quote(&input).unwrap_err(),
            CatalogError::InvalidRequest(_)
        ));
    }

    #[test]
    fn test_summary_mentions_consultation_when_unpriced() {
        let fixture = create_test_fixture();

        let priced = build_quote(&full_input(&fixture, 60, 0)).unwrap();
        assert!(priced.summary().contains("450000 / month"));

        let unpriced = build_quote(&full_input(&fixture, 60, 30)).unwrap();
        assert!(unpriced.summary().contains("consultation"));
    }
}
