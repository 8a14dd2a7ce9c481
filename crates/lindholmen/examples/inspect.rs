#![forbid(unsafe_code)]

//! Print the validation report of every signature in an XML file.
//!
//! Detached documents are loaded from the paths after the first argument and
//! matched by file name.

use lindholmen::xades::{DocumentSet, InMemoryDocument, SignatureOutcome};
use lindholmen::xml::XmlDocument;
use lindholmen::{validate_document, ValidationContext};
use std::path::Path;

fn main() {
    let mut args = std::env::args().skip(1);
    let path = args.next().expect("usage: inspect <signature.xml> [detached...]");
    let xml = std::fs::read_to_string(&path).unwrap();

    let mut documents = DocumentSet::new();
    for detached in args {
        let name = Path::new(&detached)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&detached)
            .to_owned();
        documents.push(InMemoryDocument::new(name, std::fs::read(&detached).unwrap()));
    }
    let ctx = ValidationContext::new().with_documents(documents);

    let report = validate_document(&XmlDocument::parse(xml).unwrap(), &ctx).unwrap();
    for outcome in &report.signatures {
        match outcome {
            SignatureOutcome::Validated(r) => {
                eprintln!("=== {} {}", r.id.as_deref().unwrap_or("<anonymous>"), r.level);
                for t in &r.timestamps {
                    eprintln!("    {} intact={} covers {}", t.element, t.message_imprint_intact, t.covered.len());
                }
            }
            SignatureOutcome::Failed { id, error } => {
                eprintln!("=== {} failed: {error}", id.as_deref().unwrap_or("<anonymous>"));
            }
        }
    }
    println!("{}", serde_json::to_string_pretty(&report).unwrap());
}
