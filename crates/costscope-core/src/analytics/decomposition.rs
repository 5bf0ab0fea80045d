//! Unit-cost change waterfall between two windows.
//!
//! Drivers are computed in cost space and expressed per unit of reference volume
//! (current quantity, else previous). `mixShift` absorbs the residual so the
//! components always sum to `end_unit_cost - start_unit_cost`.

use serde::Serialize;

use super::aggregate::WindowAggregate;
use crate::numeric::{round_money, round_unit, safe_div};

/// Named step of the decomposition waterfall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ComponentKind {
    NewServicesResources,
    UsageGrowth,
    RatePriceChange,
    MixShift,
    CreditsDiscountChange,
    SavingsRemovals,
}

impl ComponentKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::NewServicesResources => "New services / resources",
            Self::UsageGrowth => "Usage growth",
            Self::RatePriceChange => "Rate / price change",
            Self::MixShift => "Mix shift",
            Self::CreditsDiscountChange => "Credits / discount change",
            Self::SavingsRemovals => "Shared allocation shift / savings removals",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecompositionComponent {
    pub key: ComponentKind,
    pub label: String,
    pub value: f64,
}

/// Inputs drawn from the previous and current window aggregates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DecompositionInputs {
    /// Window totals as aggregated, not rebuilt from price times quantity: a
    /// window can carry cost with no usage quantity.
    pub previous_total_cost: f64,
    pub current_total_cost: f64,
    pub previous_unit_price: f64,
    pub current_unit_price: f64,
    pub previous_quantity: f64,
    pub current_quantity: f64,
    pub previous_commitment_benefit: f64,
    pub current_commitment_benefit: f64,
    pub previous_shared_cost: f64,
    pub current_shared_cost: f64,
}

impl DecompositionInputs {
    pub fn from_aggregates(previous: &WindowAggregate, current: &WindowAggregate) -> Self {
        Self {
            previous_total_cost: previous.total_cost,
            current_total_cost: current.total_cost,
            previous_unit_price: previous.avg_unit_price,
            current_unit_price: current.avg_unit_price,
            previous_quantity: previous.total_quantity,
            current_quantity: current.total_quantity,
            previous_commitment_benefit: previous.commitment_benefit,
            current_commitment_benefit: current.commitment_benefit,
            previous_shared_cost: previous.shared_cost,
            current_shared_cost: current.shared_cost,
        }
    }
}

/// The waterfall plus its closure check. Values are already rounded
/// (unit costs to 6 dp, `cost_delta` to 2 dp).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Decomposition {
    pub start_unit_cost: f64,
    pub end_unit_cost: f64,
    pub cost_delta: f64,
    pub components: Vec<DecompositionComponent>,
    /// `sum(components) - (end - start)`; within epsilon of zero by construction.
    pub validation_delta: f64,
}

impl Decomposition {
    pub fn component(&self, kind: ComponentKind) -> Option<&DecompositionComponent> {
        self.components.iter().find(|c| c.key == kind)
    }

    pub fn component_sum(&self) -> f64 {
        self.components.iter().map(|c| c.value).sum()
    }
}

/// Builds the decomposition waterfall.
pub fn decompose(inputs: &DecompositionInputs) -> Decomposition {
    let start = round_unit(inputs.previous_unit_price);
    let end = round_unit(inputs.current_unit_price);
    let previous_cost = inputs.previous_total_cost;
    let current_cost = inputs.current_total_cost;

    let reference_volume = if inputs.current_quantity > 0.0 {
        inputs.current_quantity
    } else if inputs.previous_quantity > 0.0 {
        inputs.previous_quantity
    } else {
        0.0
    };

    let mut new_services = 0.0;
    let mut usage_growth = 0.0;
    let mut rate_change = 0.0;
    let mut credits = 0.0;
    let mut shared_shift = 0.0;

    if reference_volume > 0.0 {
        if previous_cost == 0.0 && current_cost > 0.0 {
            new_services = end - start;
        } else {
            let delta_quantity = inputs.current_quantity - inputs.previous_quantity;
            let delta_price = inputs.current_unit_price - inputs.previous_unit_price;
            let delta_benefit = inputs.current_commitment_benefit - inputs.previous_commitment_benefit;
            let delta_shared = inputs.current_shared_cost - inputs.previous_shared_cost;

            usage_growth = safe_div(delta_quantity * inputs.previous_unit_price, reference_volume);
            rate_change = safe_div(delta_price * inputs.current_quantity, reference_volume);
            credits = safe_div(-delta_benefit, reference_volume);
            shared_shift = safe_div(delta_shared, reference_volume);
        }
    }

    let drivers = [
        (ComponentKind::NewServicesResources, round_unit(new_services)),
        (ComponentKind::UsageGrowth, round_unit(usage_growth)),
        (ComponentKind::RatePriceChange, round_unit(rate_change)),
        (ComponentKind::CreditsDiscountChange, round_unit(credits)),
        (ComponentKind::SavingsRemovals, round_unit(shared_shift)),
    ];
    let driver_sum: f64 = drivers.iter().map(|(_, v)| v).sum();
    let mix_shift = round_unit((end - start) - driver_sum);

    let mut components: Vec<DecompositionComponent> = drivers
        .into_iter()
        .map(|(key, value)| DecompositionComponent { key, label: key.label().to_string(), value })
        .collect();
    components.insert(
        3,
        DecompositionComponent { key: ComponentKind::MixShift, label: ComponentKind::MixShift.label().to_string(), value: mix_shift },
    );

    let sum: f64 = components.iter().map(|c| c.value).sum();
    Decomposition {
        start_unit_cost: start,
        end_unit_cost: end,
        cost_delta: round_money(current_cost - previous_cost),
        components,
        validation_delta: round_unit(sum - (end - start)),
    }
}
