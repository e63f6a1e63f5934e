//! Mass-flow PCI engine following Bracquené et al. (2020).

use log::{debug, warn};

use super::circularity_model::{CircularityError, PciMaterialFlows, PciMaterialInputs, PciResult};
use crate::bom::BomLine;
use crate::errors::Result;
use crate::products::Product;
use crate::scenarios::{MaterialCircularityParameters, Scenario};

const EPS: f64 = 1e-9;

/// Calculates circularity indicators for a product.
pub trait CircularityEngine: Send + Sync {
    fn calculate_pci(
        &self,
        product: &Product,
        lines: &[BomLine],
        scenario: &Scenario,
    ) -> Result<PciResult>;
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Finds the parameter set for a line: material code, then family, then the
/// scenario default, then the first entry of the table in key order.
pub fn resolve_material_parameters<'a>(
    line: &BomLine,
    scenario: &'a Scenario,
) -> Result<&'a MaterialCircularityParameters> {
    let keys = [line.material_code.as_deref(), line.material_family.as_deref()];
    for key in keys.into_iter().flatten() {
        if let Some(params) = scenario.material_parameters.get(key) {
            return Ok(params);
        }
    }

    if let Some(params) = scenario.default_material_parameters.as_ref() {
        return Ok(params);
    }

    if let Some((key, params)) = scenario.material_parameters.iter().next() {
        warn!(
            "No circularity parameters for BOM item {} ({}); falling back to '{}'",
            line.id,
            line.material_key(),
            key
        );
        return Ok(params);
    }

    Err(CircularityError::MissingMaterialParameters {
        material: line.material_key().to_string(),
    }
    .into())
}

#[derive(Debug, Default, Clone, Copy)]
struct FlowTerms {
    v: f64,
    w_fp: f64,
    w_cp: f64,
    w_u: f64,
    w_ms: f64,
    w_rfp: f64,
    w_total: f64,
    r_in: f64,
    r_fp: f64,
    r_cp: f64,
    r_eol: f64,
    r_out: f64,
    r_net: f64,
    c_net: f64,
}

impl FlowTerms {
    fn compute(inputs: &PciMaterialInputs) -> Self {
        let mass = inputs.mass.max(0.0);
        let fu = clamp_unit(inputs.reused_share);
        let fr = clamp_unit(inputs.recycled_content_share);
        let e_cp = clamp_unit(inputs.efficiency_component_production).max(EPS);
        let e_fp = clamp_unit(inputs.efficiency_feedstock_production).max(EPS);
        let c_cp = clamp_unit(inputs.recovered_fraction_component_losses);
        let c_fp = clamp_unit(inputs.recovered_fraction_feedstock_losses);
        let e_ms = clamp_unit(inputs.efficiency_material_separation_eol);
        let e_rfp = clamp_unit(inputs.efficiency_recycled_feedstock_production);
        let c_u = clamp_unit(inputs.collection_fraction_for_reuse);
        let c_r = clamp_unit(inputs.collection_fraction_for_recycling);

        // Production chain
        let net_new_mass = mass * (1.0 - fu).max(0.0);
        let component_input = if net_new_mass > 0.0 {
            net_new_mass / e_cp
        } else {
            0.0
        };
        let feedstock_input = if component_input > 0.0 {
            component_input / e_fp
        } else {
            0.0
        };
        let r_in = fr * feedstock_input;
        let v = (feedstock_input - r_in).max(0.0);

        let component_waste = (component_input - net_new_mass).max(0.0);
        let feedstock_waste = (feedstock_input - component_input).max(0.0);
        let w_cp = component_waste * (1.0 - c_cp);
        let r_cp = component_waste * c_cp;
        let w_fp = feedstock_waste * (1.0 - c_fp);
        let r_fp = feedstock_waste * c_fp;

        // End of life
        let w_u = mass * (1.0 - c_u - c_r).max(0.0);
        let collected = mass * c_r;
        let separated = collected * e_ms;
        let w_ms = collected * (1.0 - e_ms);
        let w_rfp = separated * (1.0 - e_rfp);
        let r_eol = separated * e_rfp;

        let w_total = w_fp + w_cp + w_u + w_ms + w_rfp;
        let r_out = r_fp + r_cp + r_eol;

        Self {
            v,
            w_fp,
            w_cp,
            w_u,
            w_ms,
            w_rfp,
            w_total,
            r_in,
            r_fp,
            r_cp,
            r_eol,
            r_out,
            r_net: r_in - r_out,
            c_net: mass * (fu - c_u),
        }
    }

    fn linear_flow(&self) -> f64 {
        self.v + self.w_total + self.r_net.abs() + self.c_net.abs()
    }
}

fn pci_from_lfi(lfi: f64, utility_factor: f64) -> f64 {
    clamp_unit(1.0 - lfi / utility_factor.max(EPS))
}

/// Computes the material flows, LFI and PCI of one material slice.
pub(crate) fn material_flows(inputs: &PciMaterialInputs, utility_factor: f64) -> PciMaterialFlows {
    let actual = FlowTerms::compute(inputs);
    let linear = FlowTerms::compute(&inputs.linear_baseline());

    let lfi = actual.linear_flow() / (linear.v + linear.w_total).max(EPS);

    PciMaterialFlows {
        material_key: inputs.material_key.clone(),
        mass: inputs.mass,
        reused_share: inputs.reused_share,
        recycled_content_share: inputs.recycled_content_share,
        v: actual.v,
        w_fp: actual.w_fp,
        w_cp: actual.w_cp,
        w_u: actual.w_u,
        w_ms: actual.w_ms,
        w_rfp: actual.w_rfp,
        w_total: actual.w_total,
        r_in: actual.r_in,
        r_fp: actual.r_fp,
        r_cp: actual.r_cp,
        r_eol: actual.r_eol,
        r_out: actual.r_out,
        r_net: actual.r_net,
        c_net: actual.c_net,
        v_linear: linear.v,
        w_linear: linear.w_total,
        lfi_material: lfi,
        pci_material: pci_from_lfi(lfi, utility_factor),
    }
}

fn validate_scenario(scenario: &Scenario) -> Result<()> {
    let checks = [
        (
            "collection fraction for reuse",
            scenario.collection_fraction_for_reuse,
        ),
        (
            "collection fraction for recycling",
            scenario.collection_fraction_for_recycling,
        ),
    ];
    for (label, value) in checks {
        if !value.is_finite() {
            return Err(CircularityError::InvalidScenario(format!(
                "{} of scenario '{}' is not a finite number",
                label, scenario.id
            ))
            .into());
        }
    }
    let uf = scenario.compute_utility_factor();
    if !uf.is_finite() {
        return Err(CircularityError::InvalidScenario(format!(
            "utility factor of scenario '{}' is not a finite number (got {})",
            scenario.id, uf
        ))
        .into());
    }
    Ok(())
}

/// PCI engine based on material mass flows.
///
/// Each line with positive mass (`mass_kg * quantity`) is evaluated against
/// its linear baseline; lines without mass are skipped. The product PCI is
/// the mass-weighted average of the material PCIs.
#[derive(Debug, Default, Clone)]
pub struct MassFlowPciEngine;

impl MassFlowPciEngine {
    pub fn new() -> Self {
        Self
    }
}

impl CircularityEngine for MassFlowPciEngine {
    fn calculate_pci(
        &self,
        product: &Product,
        lines: &[BomLine],
        scenario: &Scenario,
    ) -> Result<PciResult> {
        validate_scenario(scenario)?;
        let utility_factor = scenario.compute_utility_factor();

        let mut per_material = Vec::new();
        let mut mass_total = 0.0;
        let mut weighted_pci = 0.0;
        let (mut v, mut w, mut r_net, mut c_net, mut v_linear, mut w_linear) =
            (0.0, 0.0, 0.0, 0.0, 0.0, 0.0);

        for line in lines {
            let mass = line.total_mass();
            if mass.is_nan() || mass <= 0.0 {
                debug!("Skipping BOM item {} without mass", line.id);
                continue;
            }
            let params = resolve_material_parameters(line, scenario)?;
            let inputs = PciMaterialInputs {
                material_key: line.material_key().to_string(),
                mass,
                reused_share: clamp_unit(line.reused_share.unwrap_or(0.0)),
                recycled_content_share: clamp_unit(line.recycled_content_share.unwrap_or(0.0)),
                efficiency_feedstock_production: clamp_unit(params.efficiency_feedstock_production),
                efficiency_component_production: clamp_unit(params.efficiency_component_production),
                recovered_fraction_feedstock_losses: clamp_unit(
                    params.recovered_fraction_feedstock_losses,
                ),
                recovered_fraction_component_losses: clamp_unit(
                    params.recovered_fraction_component_losses,
                ),
                efficiency_material_separation_eol: clamp_unit(
                    params.efficiency_material_separation_eol,
                ),
                efficiency_recycled_feedstock_production: clamp_unit(
                    params.efficiency_recycled_feedstock_production,
                ),
                collection_fraction_for_reuse: clamp_unit(scenario.collection_fraction_for_reuse),
                collection_fraction_for_recycling: clamp_unit(
                    scenario.collection_fraction_for_recycling,
                ),
            };

            let flows = material_flows(&inputs, utility_factor);
            mass_total += mass;
            weighted_pci += flows.pci_material * mass;
            v += flows.v;
            w += flows.w_total;
            r_net += flows.r_net;
            c_net += flows.c_net;
            v_linear += flows.v_linear;
            w_linear += flows.w_linear;
            per_material.push(flows);
        }

        let lfi_product = (v + w + r_net.abs() + c_net.abs()) / (v_linear + w_linear).max(EPS);
        let pci_product = if mass_total > 0.0 {
            clamp_unit(weighted_pci / mass_total)
        } else {
            0.0
        };

        debug!(
            "PCI for product {} under scenario {}: {:.4} ({} materials, {:.3} kg)",
            product.id,
            scenario.id,
            pci_product,
            per_material.len(),
            mass_total
        );

        Ok(PciResult {
            product_id: product.id.clone(),
            scenario_id: scenario.id.clone(),
            pci_product,
            utility_factor,
            lfi_product,
            mass_total,
            per_material_flows: per_material,
            notes: vec![
                "PCI derived from Bracquené et al. (2020) mass flow equations".to_string(),
                "Product PCI is the mass-weighted average of material PCIs".to_string(),
                "Utility factor defaults to 1 if not provided".to_string(),
            ],
        })
    }
}
