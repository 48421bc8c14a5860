// Product amount calculator
//
// Pure functions: simulator answers in, one result per catalog product out.
// Amounts are annual estimates in euros, rounded to the unit.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::models::status::ProduitType;

pub const SCORE_FINANCIAL_ELIGIBLE: i32 = 90;
pub const SCORE_QUALITATIVE_ELIGIBLE: i32 = 75;
pub const SCORE_NOT_ELIGIBLE: i32 = 0;

const TICPE_SECTORS: &[&str] = &[
    "Transport routier de marchandises",
    "Transport routier de voyageurs",
    "Taxi / VTC",
    "BTP / Travaux publics",
    "Terrassement",
    "Secteur Agricole",
];
const TICPE_VEHICLES: &[&str] = &[
    "Camions de plus de 7,5 tonnes",
    "Engins de chantier",
    "Tracteurs agricoles",
];
const DFS_SECTORS: &[&str] = &[
    "Transport routier de marchandises",
    "Transport routier de voyageurs",
    "Taxi / VTC",
];
const CHRONO_SECTORS: &[&str] = &[
    "Transport routier de marchandises",
    "Transport routier de voyageurs",
];
const CHRONO_VEHICLES: &[&str] = &["Camions de plus de 7,5 tonnes", "Camions de 3,5 à 7,5 tonnes"];
const AGRICULTURAL_SECTOR: &str = "Secteur Agricole";
const RD_YES: &[&str] = &["Oui, régulièrement", "Oui, occasionnellement"];

const TICPE_RATE_PER_LITRE: f64 = 0.20;
const AVERAGE_GROSS_SALARY: f64 = 35_000.0;
const URSSAF_REDUCTION_RATE: f64 = 0.10;
const DFS_DEDUCTION_PER_DRIVER: f64 = 150.0;
const FONCIER_RECOVERY_RATE: f64 = 0.20;
const CEE_RATE: f64 = 0.30;
const MSA_REDUCTION_RATE: f64 = 0.065;
const ENERGY_RECOVERY_RATE: f64 = 0.30;
const RECOVERY_RATE: f64 = 1.0;
const EXPORT_VAT_RATE: f64 = 0.20;

/// Employee count used for an employee bracket answer
pub fn employees_for_bracket(bracket: &str) -> i32 {
    match bracket.trim() {
        "1 à 5" => 3,
        "6 à 20" => 13,
        "21 à 50" => 35,
        "Plus de 50" => 75,
        _ => 0,
    }
}

/// Median turnover for a turnover bracket answer
pub fn turnover_for_bracket(bracket: &str) -> f64 {
    match bracket.trim() {
        "Moins de 100 000€" => 50_000.0,
        "100 000€ - 500 000€" => 300_000.0,
        "500 000€ - 1 000 000€" => 750_000.0,
        "1 000 000€ - 5 000 000€" => 2_500_000.0,
        "Plus de 5 000 000€" => 7_000_000.0,
        _ => 0.0,
    }
}

fn rd_amount_for_bracket(bracket: &str) -> f64 {
    match bracket.trim() {
        "Moins de 50 000€" => 25_000.0,
        "50 000€ - 100 000€" => 75_000.0,
        "100 000€ - 500 000€" => 300_000.0,
        "Plus de 500 000€" => 750_000.0,
        _ => 0.0,
    }
}

fn unpaid_amount_for_bracket(bracket: &str) -> f64 {
    match bracket.trim() {
        "Oui, montant faible (< 10 000€)" => 5_000.0,
        "Oui, montant modéré (10 000€ - 50 000€)" => 30_000.0,
        "Oui, montant important (> 50 000€)" => 75_000.0,
        _ => 0.0,
    }
}

fn export_amount_for_bracket(bracket: &str) -> f64 {
    match bracket.trim() {
        "Oui, < 50 000€" => 25_000.0,
        "Oui, Entre 50 000€ et 100 000€" => 75_000.0,
        "Oui, Entre 100 000€ et 500 000€" => 300_000.0,
        "Oui, + de 500 000€" => 750_000.0,
        _ => 0.0,
    }
}

/// Questionnaire answers relevant to the calculator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SimulationAnswers {
    pub secteur: Option<String>,
    pub ca_tranche: Option<String>,
    pub nb_employes_tranche: Option<String>,
    pub proprietaire_locaux: Option<String>,
    pub contrats_energie: Option<String>,
    pub possede_vehicules: Option<String>,
    #[serde(default)]
    pub types_vehicules: Vec<String>,
    pub niveau_impayes: Option<String>,
    pub depenses_rd: Option<String>,
    pub montant_rd_tranche: Option<String>,
    pub litres_carburant_mois: Option<f64>,
    pub nb_chauffeurs: Option<f64>,
    pub montant_taxe_fonciere: Option<f64>,
    pub montant_factures_energie_mois: Option<f64>,
    pub export_annuel: Option<String>,
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("Oui".to_string()),
        Value::Bool(false) => Some("Non".to_string()),
        Value::Array(items) => items.iter().find_map(value_as_text),
        Value::Object(obj) => obj.get("value").and_then(value_as_text),
        _ => None,
    }
}

fn value_as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .trim()
            .replace([' ', '\u{a0}', '€'], "")
            .replace(',', ".")
            .parse()
            .ok(),
        Value::Array(items) => items.iter().find_map(value_as_number),
        Value::Object(obj) => obj.get("value").and_then(value_as_number),
        _ => None,
    }
    .filter(|n: &f64| n.is_finite())
}

fn value_as_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(value_as_text).collect(),
        other => value_as_text(other).into_iter().collect(),
    }
}

impl SimulationAnswers {
    /// Build from `(question code, answer)` pairs. Codes from the seeded
    /// questionnaire and the calculator field names are both accepted.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a Value)>,
    {
        let mut answers = SimulationAnswers::default();
        for (code, value) in pairs {
            match code {
                "secteur" | "secteur_activite" => answers.secteur = value_as_text(value),
                "chiffre_affaires" | "ca_tranche" => answers.ca_tranche = value_as_text(value),
                "nombre_employes" | "nb_employes_tranche" => {
                    answers.nb_employes_tranche = value_as_text(value)
                }
                "proprietaire_locaux" => answers.proprietaire_locaux = value_as_text(value),
                "contrats_energie" => answers.contrats_energie = value_as_text(value),
                "possede_vehicules" => answers.possede_vehicules = value_as_text(value),
                "types_vehicules" => answers.types_vehicules = value_as_list(value),
                "impayes" | "niveau_impayes" => answers.niveau_impayes = value_as_text(value),
                "depenses_rd" => answers.depenses_rd = value_as_text(value),
                "montant_rd" | "montant_rd_tranche" => {
                    answers.montant_rd_tranche = value_as_text(value)
                }
                "litres_carburant_mois" => answers.litres_carburant_mois = value_as_number(value),
                "nb_chauffeurs" => answers.nb_chauffeurs = value_as_number(value),
                "montant_taxe_fonciere" => answers.montant_taxe_fonciere = value_as_number(value),
                "montant_factures_energie_mois" => {
                    answers.montant_factures_energie_mois = value_as_number(value)
                }
                "export_montant" | "export_annuel" => answers.export_annuel = value_as_text(value),
                _ => {}
            }
        }
        answers
    }

    pub fn from_map(map: &Map<String, Value>) -> Self {
        Self::from_pairs(map.iter().map(|(k, v)| (k.as_str(), v)))
    }

    fn sector_in(&self, sectors: &[&str]) -> bool {
        self.secteur
            .as_deref()
            .map(|s| sectors.contains(&s))
            .unwrap_or(false)
    }

    fn has_vehicle_in(&self, types: &[&str]) -> bool {
        self.types_vehicules.iter().any(|t| types.contains(&t.as_str()))
    }

    fn is_yes(answer: &Option<String>) -> bool {
        answer.as_deref() == Some("Oui")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CalculationDetails {
    pub formula: String,
    #[schema(value_type = Object)]
    pub inputs: Map<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub intermediate_values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProductCalculation {
    pub produit_code: String,
    pub produit_nom: String,
    pub is_eligible: bool,
    #[serde(rename = "type")]
    pub product_type: ProduitType,
    pub estimated_savings: Option<f64>,
    pub calculation_details: CalculationDetails,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qualitative_benefits: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Eleve,
    Moyen,
    Faible,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::Eleve => "eleve",
            ConfidenceLevel::Moyen => "moyen",
            ConfidenceLevel::Faible => "faible",
        }
    }
}

impl ProductCalculation {
    fn financial(
        code: &str,
        nom: &str,
        formula: &str,
        amount: Option<f64>,
        inputs: Map<String, Value>,
        intermediate: &[(&str, f64)],
    ) -> Self {
        let eligible = amount.map(|a| a > 0.0).unwrap_or(false);
        Self {
            produit_code: code.to_string(),
            produit_nom: nom.to_string(),
            is_eligible: eligible,
            product_type: ProduitType::Financier,
            estimated_savings: Some(if eligible {
                amount.unwrap_or(0.0).round()
            } else {
                0.0
            }),
            calculation_details: CalculationDetails {
                formula: formula.to_string(),
                inputs,
                intermediate_values: if eligible {
                    intermediate
                        .iter()
                        .map(|(k, v)| (k.to_string(), *v))
                        .collect()
                } else {
                    BTreeMap::new()
                },
            },
            qualitative_benefits: Vec::new(),
        }
    }

    pub fn eligibility_score(&self) -> i32 {
        match (self.is_eligible, self.product_type) {
            (true, ProduitType::Financier) => SCORE_FINANCIAL_ELIGIBLE,
            (true, ProduitType::Qualitatif) => SCORE_QUALITATIVE_ELIGIBLE,
            (false, _) => SCORE_NOT_ELIGIBLE,
        }
    }

    pub fn confidence_level(&self) -> ConfidenceLevel {
        match (self.is_eligible, self.product_type) {
            (true, ProduitType::Financier) => ConfidenceLevel::Eleve,
            (true, ProduitType::Qualitatif) => ConfidenceLevel::Moyen,
            (false, _) => ConfidenceLevel::Faible,
        }
    }

    pub fn recommendations(&self) -> Vec<String> {
        let follow_up = "Inscrivez-vous pour une analyse approfondie de votre dossier".to_string();
        match (self.is_eligible, self.estimated_savings) {
            (true, Some(savings)) if savings > 0.0 => vec![
                format!(
                    "Éligibilité possible ! Gain potentiel de {}€",
                    format_euros(savings)
                ),
                follow_up,
            ],
            (true, _) => {
                let mut recs = vec!["Éligible : bénéfices qualitatifs identifiés".to_string()];
                recs.extend(self.qualitative_benefits.iter().cloned());
                recs.push(follow_up);
                recs
            }
            (false, _) => vec!["Non éligible".to_string(), follow_up],
        }
    }
}

/// Formats an amount with French thousands grouping: 12 345
pub fn format_euros(amount: f64) -> String {
    let rounded = amount.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(c);
    }
    if rounded < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

fn inputs(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v > 0.0)
}

pub fn calculate_ticpe(a: &SimulationAnswers) -> ProductCalculation {
    let eligible = a.sector_in(TICPE_SECTORS)
        && SimulationAnswers::is_yes(&a.possede_vehicules)
        && a.has_vehicle_in(TICPE_VEHICLES);
    let litres = positive(a.litres_carburant_mois).filter(|_| eligible);
    let annual_litres = litres.map(|l| l * 12.0);
    let amount = annual_litres.map(|l| l * TICPE_RATE_PER_LITRE);
    ProductCalculation::financial(
        "TICPE",
        "Remboursement TICPE",
        "litres/mois × 12 × 0,20€",
        amount,
        inputs(&[
            ("litres_mois", a.litres_carburant_mois.unwrap_or(0.0).into()),
            ("taux", TICPE_RATE_PER_LITRE.into()),
        ]),
        &[
            ("litres_annuels", annual_litres.unwrap_or(0.0)),
            ("montant_annuel", amount.unwrap_or(0.0)),
        ],
    )
}

pub fn calculate_urssaf(a: &SimulationAnswers) -> ProductCalculation {
    let employees = a
        .nb_employes_tranche
        .as_deref()
        .map(employees_for_bracket)
        .unwrap_or(0);
    let payroll = f64::from(employees) * AVERAGE_GROSS_SALARY;
    let amount = (employees > 0).then_some(payroll * URSSAF_REDUCTION_RATE);
    ProductCalculation::financial(
        "URSSAF",
        "Réduction URSSAF",
        "nb_employés × 35 000€ × 10%",
        amount,
        inputs(&[
            ("nb_employes", employees.into()),
            ("salaire_moyen", AVERAGE_GROSS_SALARY.into()),
            ("taux_reduction", URSSAF_REDUCTION_RATE.into()),
        ]),
        &[
            ("masse_salariale", payroll),
            ("montant_annuel", amount.unwrap_or(0.0)),
        ],
    )
}

pub fn calculate_dfs(a: &SimulationAnswers) -> ProductCalculation {
    let drivers = positive(a.nb_chauffeurs).filter(|_| a.sector_in(DFS_SECTORS));
    let amount = drivers.map(|d| d * DFS_DEDUCTION_PER_DRIVER);
    ProductCalculation::financial(
        "DFS",
        "Déduction Forfaitaire Spécifique",
        "nb_chauffeurs × 150€",
        amount,
        inputs(&[
            ("nb_chauffeurs", a.nb_chauffeurs.unwrap_or(0.0).into()),
            ("deduction_unitaire", DFS_DEDUCTION_PER_DRIVER.into()),
        ]),
        &[("montant_annuel", amount.unwrap_or(0.0))],
    )
}

pub fn calculate_foncier(a: &SimulationAnswers) -> ProductCalculation {
    let tax = positive(a.montant_taxe_fonciere)
        .filter(|_| SimulationAnswers::is_yes(&a.proprietaire_locaux));
    let amount = tax.map(|t| t * FONCIER_RECOVERY_RATE);
    ProductCalculation::financial(
        "FONCIER",
        "Optimisation Foncier Entreprise",
        "taxe_foncière × 20%",
        amount,
        inputs(&[
            ("taxe_fonciere", a.montant_taxe_fonciere.unwrap_or(0.0).into()),
            ("taux_recuperation", FONCIER_RECOVERY_RATE.into()),
        ]),
        &[
            ("montant_annuel", amount.unwrap_or(0.0)),
            ("montant_total_6ans", amount.unwrap_or(0.0) * 6.0),
        ],
    )
}

pub fn calculate_cee(a: &SimulationAnswers) -> ProductCalculation {
    let spends_on_rd = a
        .depenses_rd
        .as_deref()
        .map(|d| RD_YES.contains(&d))
        .unwrap_or(false);
    let rd_amount = a
        .montant_rd_tranche
        .as_deref()
        .map(rd_amount_for_bracket)
        .unwrap_or(0.0);
    let amount = (spends_on_rd && rd_amount > 0.0).then_some(rd_amount * CEE_RATE);
    ProductCalculation::financial(
        "CEE",
        "Certificats Économie Énergie",
        "montant_RD × 30%",
        amount,
        inputs(&[("montant_rd", rd_amount.into()), ("taux_cee", CEE_RATE.into())]),
        &[("montant_annuel", amount.unwrap_or(0.0))],
    )
}

pub fn calculate_msa(a: &SimulationAnswers) -> ProductCalculation {
    let turnover = a
        .ca_tranche
        .as_deref()
        .map(turnover_for_bracket)
        .unwrap_or(0.0);
    let eligible = a.secteur.as_deref() == Some(AGRICULTURAL_SECTOR) && turnover > 0.0;
    let amount = eligible.then_some(turnover * MSA_REDUCTION_RATE);
    ProductCalculation::financial(
        "MSA",
        "Réduction MSA",
        "CA × 6,5%",
        amount,
        inputs(&[
            ("ca", turnover.into()),
            ("taux_reduction", MSA_REDUCTION_RATE.into()),
        ]),
        &[("montant_annuel", amount.unwrap_or(0.0))],
    )
}

pub fn calculate_energie(a: &SimulationAnswers) -> ProductCalculation {
    let monthly = positive(a.montant_factures_energie_mois)
        .filter(|_| SimulationAnswers::is_yes(&a.contrats_energie));
    let annual = monthly.map(|m| m * 12.0);
    let amount = annual.map(|y| y * ENERGY_RECOVERY_RATE);
    ProductCalculation::financial(
        "ENERGIE",
        "Optimisation Énergie",
        "factures/mois × 12 × 30%",
        amount,
        inputs(&[
            (
                "factures_mois",
                a.montant_factures_energie_mois.unwrap_or(0.0).into(),
            ),
            ("taux_recuperation", ENERGY_RECOVERY_RATE.into()),
        ]),
        &[
            ("factures_annuelles", annual.unwrap_or(0.0)),
            ("montant_annuel", amount.unwrap_or(0.0)),
        ],
    )
}

pub fn calculate_recouvrement(a: &SimulationAnswers) -> ProductCalculation {
    let unpaid = a
        .niveau_impayes
        .as_deref()
        .map(unpaid_amount_for_bracket)
        .unwrap_or(0.0);
    let amount = (unpaid > 0.0).then_some(unpaid * RECOVERY_RATE);
    ProductCalculation::financial(
        "RECOUVREMENT",
        "Recouvrement Créances",
        "impayés × 100%",
        amount,
        inputs(&[
            ("impayes", unpaid.into()),
            ("taux_recuperation", RECOVERY_RATE.into()),
        ]),
        &[("montant_recuperable", amount.unwrap_or(0.0))],
    )
}

pub fn calculate_tva(a: &SimulationAnswers) -> ProductCalculation {
    let export = a
        .export_annuel
        .as_deref()
        .map(export_amount_for_bracket)
        .unwrap_or(0.0);
    let amount = (export > 0.0).then_some(export * EXPORT_VAT_RATE);
    ProductCalculation::financial(
        "TVA",
        "Remboursement Crédit TVA",
        "export × 20%",
        amount,
        inputs(&[("export", export.into()), ("taux_tva", EXPORT_VAT_RATE.into())]),
        &[("montant_recuperable", amount.unwrap_or(0.0))],
    )
}

pub fn calculate_chronotachygraphes(a: &SimulationAnswers) -> ProductCalculation {
    let eligible = a.sector_in(CHRONO_SECTORS) && a.has_vehicle_in(CHRONO_VEHICLES);
    ProductCalculation {
        produit_code: "CHRONOTACHYGRAPHES".to_string(),
        produit_nom: "Chronotachygraphes Digitaux".to_string(),
        is_eligible: eligible,
        product_type: ProduitType::Qualitatif,
        estimated_savings: None,
        calculation_details: CalculationDetails {
            formula: "Bénéfices qualitatifs".to_string(),
            inputs: inputs(&[
                ("secteur", a.secteur.clone().map(Value::from).unwrap_or(Value::Null)),
                ("types_vehicules", a.types_vehicules.clone().into()),
            ]),
            intermediate_values: BTreeMap::new(),
        },
        qualitative_benefits: [
            "10-15 heures/mois de gestion administrative gagnées",
            "Données de conduite 100% fiables et traçables",
            "Conformité réglementaire garantie",
            "Sécurité juridique renforcée",
            "Réduction des pertes de données",
            "Moins de litiges lors des contrôles routiers",
        ]
        .iter()
        .map(|b| b.to_string())
        .collect(),
    }
}

/// One result per catalog product, in catalog order
pub fn calculate_all_products(answers: &SimulationAnswers) -> Vec<ProductCalculation> {
    vec![
        calculate_ticpe(answers),
        calculate_urssaf(answers),
        calculate_dfs(answers),
        calculate_foncier(answers),
        calculate_cee(answers),
        calculate_msa(answers),
        calculate_energie(answers),
        calculate_recouvrement(answers),
        calculate_tva(answers),
        calculate_chronotachygraphes(answers),
    ]
}

/// Sum of estimated savings over eligible products
pub fn total_savings(results: &[ProductCalculation]) -> f64 {
    results
        .iter()
        .filter(|r| r.is_eligible)
        .filter_map(|r| r.estimated_savings)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transport_company() -> SimulationAnswers {
        let answers = json!({
            "secteur": "Transport routier de marchandises",
            "nombre_employes": "6 à 20",
            "chiffre_affaires": "1 000 000€ - 5 000 000€",
            "possede_vehicules": "Oui",
            "types_vehicules": ["Camions de plus de 7,5 tonnes", "Véhicules utilitaires légers"],
            "litres_carburant_mois": "5 000",
            "nb_chauffeurs": 8,
            "proprietaire_locaux": "Oui",
            "montant_taxe_fonciere": 12000,
            "depenses_rd": "Non",
            "contrats_energie": "Oui",
            "montant_factures_energie_mois": 2500,
            "impayes": "Oui, montant modéré (10 000€ - 50 000€)",
            "export_montant": "Non"
        });
        SimulationAnswers::from_map(answers.as_object().unwrap())
    }

    fn by_code<'a>(results: &'a [ProductCalculation], code: &str) -> &'a ProductCalculation {
        results.iter().find(|r| r.produit_code == code).unwrap()
    }

    #[test]
    fn test_answer_parsing_accepts_question_codes() {
        let answers = transport_company();
        assert_eq!(answers.nb_employes_tranche.as_deref(), Some("6 à 20"));
        assert_eq!(answers.litres_carburant_mois, Some(5000.0));
        assert_eq!(answers.nb_chauffeurs, Some(8.0));
        assert_eq!(answers.types_vehicules.len(), 2);
        assert_eq!(answers.export_annuel.as_deref(), Some("Non"));
    }

    #[test]
    fn test_transport_company_amounts() {
        let results = calculate_all_products(&transport_company());
        assert_eq!(results.len(), 10);

        // 5000 L × 12 × 0.20
        assert_eq!(by_code(&results, "TICPE").estimated_savings, Some(12_000.0));
        // 13 × 35 000 × 10 %
        assert_eq!(by_code(&results, "URSSAF").estimated_savings, Some(45_500.0));
        assert_eq!(by_code(&results, "DFS").estimated_savings, Some(1_200.0));
        assert_eq!(by_code(&results, "FONCIER").estimated_savings, Some(2_400.0));
        assert_eq!(by_code(&results, "ENERGIE").estimated_savings, Some(9_000.0));
        assert_eq!(
            by_code(&results, "RECOUVREMENT").estimated_savings,
            Some(30_000.0)
        );

        assert!(!by_code(&results, "CEE").is_eligible);
        assert!(!by_code(&results, "MSA").is_eligible);
        assert!(!by_code(&results, "TVA").is_eligible);
        assert_eq!(by_code(&results, "TVA").estimated_savings, Some(0.0));

        let chrono = by_code(&results, "CHRONOTACHYGRAPHES");
        assert!(chrono.is_eligible);
        assert_eq!(chrono.estimated_savings, None);
        assert_eq!(chrono.product_type, ProduitType::Qualitatif);
    }

    #[test]
    fn test_ticpe_requires_eligible_vehicle() {
        let mut answers = transport_company();
        answers.types_vehicules = vec!["Véhicules de tourisme".to_string()];
        let ticpe = calculate_ticpe(&answers);
        assert!(!ticpe.is_eligible);
        assert!(ticpe.calculation_details.intermediate_values.is_empty());
    }

    #[test]
    fn test_agricultural_company() {
        let answers = SimulationAnswers {
            secteur: Some("Secteur Agricole".into()),
            ca_tranche: Some("100 000€ - 500 000€".into()),
            possede_vehicules: Some("Oui".into()),
            types_vehicules: vec!["Tracteurs agricoles".into()],
            litres_carburant_mois: Some(800.0),
            nb_chauffeurs: Some(2.0),
            depenses_rd: Some("Oui, occasionnellement".into()),
            montant_rd_tranche: Some("50 000€ - 100 000€".into()),
            export_annuel: Some("Oui, Entre 100 000€ et 500 000€".into()),
            ..Default::default()
        };
        assert_eq!(calculate_msa(&answers).estimated_savings, Some(19_500.0));
        assert_eq!(calculate_ticpe(&answers).estimated_savings, Some(1_920.0));
        assert_eq!(calculate_cee(&answers).estimated_savings, Some(22_500.0));
        assert_eq!(calculate_tva(&answers).estimated_savings, Some(60_000.0));
        // Drivers only count in transport sectors
        assert!(!calculate_dfs(&answers).is_eligible);
        assert!(!calculate_chronotachygraphes(&answers).is_eligible);
    }

    #[test]
    fn test_scores_and_confidence() {
        let results = calculate_all_products(&transport_company());
        let ticpe = by_code(&results, "TICPE");
        assert_eq!(ticpe.eligibility_score(), SCORE_FINANCIAL_ELIGIBLE);
        assert_eq!(ticpe.confidence_level(), ConfidenceLevel::Eleve);

        let chrono = by_code(&results, "CHRONOTACHYGRAPHES");
        assert_eq!(chrono.eligibility_score(), SCORE_QUALITATIVE_ELIGIBLE);
        assert_eq!(chrono.confidence_level(), ConfidenceLevel::Moyen);

        let msa = by_code(&results, "MSA");
        assert_eq!(msa.eligibility_score(), 0);
        assert_eq!(msa.confidence_level(), ConfidenceLevel::Faible);
        assert_eq!(msa.recommendations()[0], "Non éligible");
    }

    #[test]
    fn test_recommendation_formats_amount() {
        let results = calculate_all_products(&transport_company());
        let recs = by_code(&results, "URSSAF").recommendations();
        assert!(recs[0].contains("45 500€"));
    }

    #[test]
    fn test_format_euros() {
        assert_eq!(format_euros(0.0), "0");
        assert_eq!(format_euros(999.4), "999");
        assert_eq!(format_euros(1_234_567.0), "1 234 567");
        assert_eq!(format_euros(-12_000.0), "-12 000");
    }

    #[test]
    fn test_empty_answers_yield_nothing_eligible() {
        let results = calculate_all_products(&SimulationAnswers::default());
        assert!(results.iter().all(|r| !r.is_eligible));
        assert_eq!(total_savings(&results), 0.0);
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(calculate_urssaf(&transport_company())).unwrap();
        assert_eq!(json["type"], "financier");
        assert_eq!(json["calculation_details"]["inputs"]["nb_employes"], 13);
        assert!(json.get("qualitative_benefits").is_none());
    }
}
