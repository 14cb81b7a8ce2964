use quick_xml::de::from_str;
use serde::Deserialize;

use crate::error::{Result, ScienceError};

#[derive(Debug, Deserialize)]
struct TeiDocument {
    #[serde(rename = "teiHeader")]
    header: TeiHeader,
}

#[derive(Debug, Deserialize)]
struct TeiHeader {
    #[serde(rename = "fileDesc")]
    file_desc: FileDesc,
}

#[derive(Debug, Deserialize)]
struct FileDesc {
    #[serde(rename = "sourceDesc")]
    source_desc: Option<SourceDesc>,
}

#[derive(Debug, Deserialize)]
struct SourceDesc {
    #[serde(rename = "biblStruct")]
    bibl_struct: Option<BiblStruct>,
}

#[derive(Debug, Deserialize)]
struct BiblStruct {
    analytic: Option<Analytic>,
}

#[derive(Debug, Deserialize)]
struct Analytic {
    #[serde(rename = "author", default)]
    authors: Vec<TeiAuthorXml>,
}

#[derive(Debug, Deserialize)]
struct TeiAuthorXml {
    #[serde(rename = "persName")]
    pers_name: Option<PersName>,
    email: Option<String>,
    #[serde(rename = "idno", default)]
    idnos: Vec<TypedText>,
}

#[derive(Debug, Deserialize)]
struct PersName {
    #[serde(rename = "forename", default)]
    forenames: Vec<TypedText>,
    surname: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TypedText {
    #[serde(rename = "@type")]
    kind: Option<String>,
    #[serde(rename = "$text", default)]
    value: String,
}

/// One author from the header of a TEI document, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeiAuthor {
    pub given_name: String,
    pub family_name: String,
    pub email: Option<String>,
    pub orcid: Option<String>,
}

/// Header authors of a GROBID TEI document. Authors without a `persName`
/// (affiliation-only entries) are skipped.
pub fn parse_tei_authors(xml: &str) -> Result<Vec<TeiAuthor>> {
    let doc: TeiDocument =
        from_str(xml).map_err(|e| ScienceError::Parse(format!("invalid TEI xml: {e}")))?;

    let authors = doc
        .header
        .file_desc
        .source_desc
        .and_then(|desc| desc.bibl_struct)
        .and_then(|bibl| bibl.analytic)
        .map(|analytic| analytic.authors)
        .unwrap_or_default();

    Ok(authors.into_iter().filter_map(convert_author).collect())
}

fn convert_author(author: TeiAuthorXml) -> Option<TeiAuthor> {
    let name = author.pers_name?;
    let given_name = name
        .forenames
        .iter()
        .map(|f| f.value.trim())
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let family_name = name.surname.unwrap_or_default().trim().to_string();
    if given_name.is_empty() && family_name.is_empty() {
        return None;
    }

    let orcid = author
        .idnos
        .into_iter()
        .find(|idno| {
            idno.kind
                .as_deref()
                .is_some_and(|kind| kind.eq_ignore_ascii_case("orcid"))
        })
        .map(|idno| idno.value.trim().to_string());

    Some(TeiAuthor {
        given_name,
        family_name,
        email: author.email.map(|e| e.trim().to_string()),
        orcid,
    })
}
