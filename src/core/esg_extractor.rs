//! ESG extraction from the FRE XML.
//!
//! The XML embeds the narrative sections as base64 PDFs and carries the
//! diversity tables (governing bodies and workforce) as plain elements.

use crate::domain::esg::{
    AgeBands, Compensation, EsgData, GenderBreakdown, GoverningBodyDiversity, HumanResources,
    PdfReference, QuantitativeData, RaceBreakdown, RegionBreakdown,
};
use crate::utils::encoding::decode_cvm_text;
use crate::utils::error::Result;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use md5::{Digest, Md5};
use roxmltree::{Document, Node};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// `(section key, element holding an ImagemObjetoArquivoPdf child)`
pub const PDF_SECTIONS: [(&str, &str); 19] = [
    ("info_asg", "InfoASG"),
    ("programa_integridade", "ProgramaIntegridade"),
    ("gestao_riscos", "DescricaoGerenciamentoRiscos"),
    ("controles_internos", "DescricaoControlesInternos"),
    ("recursos_humanos", "DescricaoRH"),
    ("fatores_risco", "DescricaoFatoresRisco"),
    ("fatores_risco_principais", "Descricao5PrincipaisFatoresRisco"),
    ("historico", "HistoricoEmissor"),
    ("atividades_controladas", "AtividadesEmissorControladas"),
    ("segmentos_operacionais", "InfoSegmentosOperacionais"),
    ("producao_mercados", "ProducaoComercializacaoMercados"),
    ("regulacao_estatal", "EfeitosRegulacaoEstatal"),
    ("economia_mista", "InfoSociedadeEconomiaMista"),
    ("alteracoes_negocios", "AlteracoesNegocios"),
    ("plano_negocios", "PlanoNegocios"),
    ("caracteristicas_orgaos", "CaracteristicasOrgaosAdmECF"),
    ("conselho_adm", "InformacoesConselhoAdm"),
    ("politica_remuneracao", "PoliticaPraticaRemuneracao"),
    ("remuneracao_empregados", "RemuneracaoEmpregados"),
];

const PDF_ELEMENT: &str = "ImagemObjetoArquivoPdf";

const BODY_RACE: &str =
    "XmlFormularioReferenciaDadosFREFormularioAssembleiaGeralEAdmDescricaoCaracteristicasOrgaosAdmECFCorRaca";
const BODY_GENDER: &str =
    "XmlFormularioReferenciaDadosFREFormularioAssembleiaGeralEAdmDescricaoCaracteristicasOrgaosAdmECFGenero";
const BODY_NAME: &str = "OrgaoAdministracao";

const HR_RACE: &str = "XmlFormularioReferenciaDadosFREFormularioRecursosHumanosDescricaoRHEmissorCorRaca";
const HR_GENDER: &str = "XmlFormularioReferenciaDadosFREFormularioRecursosHumanosDescricaoRHEmissorGenero";
const HR_AGE: &str = "XmlFormularioReferenciaDadosFREFormularioRecursosHumanosDescricaoRHEmissorFaixaEtaria";
const HR_REGION: &str =
    "XmlFormularioReferenciaDadosFREFormularioRecursosHumanosDescricaoRHEmissorLocalizacaoGeografica";
const HR_COMPENSATION: &str = "RemuneracaoEmpregadosEst";

pub struct EsgExtractor {
    label: String,
    xml: String,
    pdf_dir: PathBuf,
}

impl EsgExtractor {
    /// Reads a Windows-1252 FRE XML from disk.
    pub fn from_file(xml_path: &Path, pdf_dir: impl Into<PathBuf>) -> Result<Self> {
        let bytes = std::fs::read(xml_path)?;
        Ok(Self {
            label: xml_path.display().to_string(),
            xml: decode_cvm_text(&bytes).into_owned(),
            pdf_dir: pdf_dir.into(),
        })
    }

    pub fn from_xml(
        label: impl Into<String>,
        xml: impl Into<String>,
        pdf_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            label: label.into(),
            xml: xml.into(),
            pdf_dir: pdf_dir.into(),
        }
    }

    pub fn extract(&self) -> Result<EsgData> {
        tracing::info!("Extracting ESG data from {}", self.label);

        let document = Document::parse(&self.xml).map_err(|e| {
            tracing::error!("Failed to parse XML {}: {}", self.label, e);
            e
        })?;

        let data = EsgData {
            extracted_at: Utc::now(),
            documents: self.extract_pdfs(&document)?,
            quantitative: QuantitativeData {
                governing_bodies: governing_body_diversity(&document),
                human_resources: human_resources(&document),
            },
        };

        tracing::info!(
            "ESG extraction finished for {}: {} PDF sections, {} governing bodies",
            self.label,
            data.documents.len(),
            data.quantitative.governing_bodies.len()
        );
        Ok(data)
    }

    fn extract_pdfs(&self, document: &Document) -> Result<BTreeMap<String, PdfReference>> {
        std::fs::create_dir_all(&self.pdf_dir)?;
        let mut documents = BTreeMap::new();

        for (section, element) in PDF_SECTIONS {
            let Some(encoded) = section_payload(document, element) else {
                continue;
            };
            match self.save_pdf(section, encoded) {
                Ok(reference) => {
                    documents.insert(section.to_string(), reference);
                }
                Err(e) => tracing::error!("Failed to save PDF section {}: {}", section, e),
            }
        }

        Ok(documents)
    }

    fn save_pdf(&self, section: &str, encoded: &str) -> Result<PdfReference> {
        let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let content = STANDARD.decode(cleaned)?;

        let hash = format!("{:x}", Md5::digest(&content));
        let file_name = format!("{}_{}.pdf", section, hash);
        let path = self.pdf_dir.join(&file_name);
        std::fs::write(&path, &content)?;

        tracing::debug!("Saved section {} ({} bytes) to {}", section, content.len(), path.display());
        Ok(PdfReference {
            file_name,
            hash,
            path: path.display().to_string(),
        })
    }
}

/// First non-empty `ImagemObjetoArquivoPdf` under the first `element` carrying one.
fn section_payload<'a>(document: &'a Document, element: &str) -> Option<&'a str> {
    document
        .descendants()
        .filter(|n| n.has_tag_name(element))
        .find_map(|n| n.children().find(|c| c.has_tag_name(PDF_ELEMENT)))
        .and_then(|pdf| pdf.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

fn child_text<'a>(node: Node<'a, '_>, tag: &str) -> Option<&'a str> {
    node.children()
        .find(|c| c.has_tag_name(tag))
        .and_then(|c| c.text())
        .map(str::trim)
}

/// Rows are merged by body name, so a row without one is dropped.
fn body_name<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    child_text(node, BODY_NAME).filter(|name| !name.is_empty())
}

fn int_value(node: Node, tag: &str) -> u32 {
    child_text(node, tag)
        .and_then(|text| text.parse::<u32>().ok())
        .unwrap_or(0)
}

/// Accepts both `1234.5` and `1234,5`.
fn float_value(node: Node, tag: &str) -> f64 {
    child_text(node, tag)
        .and_then(|text| {
            text.parse::<f64>()
                .ok()
                .or_else(|| text.replace(',', ".").parse::<f64>().ok())
        })
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

fn race(node: Node, brown_tag: &str, undeclared_tag: &str) -> RaceBreakdown {
    RaceBreakdown {
        asian: int_value(node, "Amarelo"),
        white: int_value(node, "Branco"),
        black: int_value(node, "Preto"),
        brown: int_value(node, brown_tag),
        indigenous: int_value(node, "Indigena"),
        other: int_value(node, "Outros"),
        undeclared: int_value(node, undeclared_tag),
    }
}

fn gender(node: Node, undeclared_tag: &str) -> GenderBreakdown {
    GenderBreakdown {
        male: int_value(node, "Masculino"),
        female: int_value(node, "Feminino"),
        non_binary: int_value(node, "NaoBinario"),
        other: int_value(node, "Outros"),
        undeclared: int_value(node, undeclared_tag),
    }
}

fn elements<'a, 'input>(
    document: &'a Document<'input>,
    tag: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    document.descendants().filter(move |n| n.has_tag_name(tag))
}

fn governing_body_diversity(document: &Document) -> Vec<GoverningBodyDiversity> {
    let mut bodies: Vec<GoverningBodyDiversity> = Vec::new();

    for node in elements(document, BODY_RACE) {
        let Some(body) = body_name(node) else {
            continue;
        };
        bodies.push(GoverningBodyDiversity {
            body: body.to_string(),
            race: Some(race(node, "Pardo", "PrefereNaoResponder")),
            gender: None,
        });
    }

    for node in elements(document, BODY_GENDER) {
        let Some(body) = body_name(node) else {
            continue;
        };
        let breakdown = gender(node, "PrefereNaoResponder");
        match bodies.iter_mut().find(|b| b.body == body) {
            Some(existing) => existing.gender = Some(breakdown),
            None => bodies.push(GoverningBodyDiversity {
                body: body.to_string(),
                race: None,
                gender: Some(breakdown),
            }),
        }
    }

    bodies
}

fn human_resources(document: &Document) -> HumanResources {
    let first = |tag: &str| document.descendants().find(|n| n.has_tag_name(tag));

    HumanResources {
        race: first(HR_RACE).map(|n| race(n, "Parda", "PrefiroNaoResponder")),
        gender: first(HR_GENDER).map(|n| gender(n, "PrefiroNaoResponder")),
        age_bands: first(HR_AGE).map(|n| AgeBands {
            under_30: int_value(n, "FaixaAbaixo30"),
            from_30_to_50: int_value(n, "FaixaDe30a50"),
            over_50: int_value(n, "FaixaAcima50"),
        }),
        regions: first(HR_REGION).map(|n| RegionBreakdown {
            north: int_value(n, "Norte"),
            northeast: int_value(n, "Nordeste"),
            center_west: int_value(n, "CentroOeste"),
            southeast: int_value(n, "Sudeste"),
            south: int_value(n, "Sul"),
            abroad: int_value(n, "Exterior"),
        }),
        compensation: first(HR_COMPENSATION).map(|n| Compensation {
            highest: float_value(n, "RemuneracaoMaior"),
            median: float_value(n, "RemuneracaoMediana"),
            ratio: float_value(n, "RazaoRemuneracoes"),
        }),
    }
}
