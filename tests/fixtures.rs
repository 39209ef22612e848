#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use nfcomx::DocumentSource;
use tempfile::TempDir;

/// Four invoice contexts; two belong to `CLUBE DE CAMPO MOEMA` under `dest`.
pub const NESTED_NFCOM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<documento>
    <infNFCom id="1">
        <ide><cUF>35</cUF><nNF>1001</nNF></ide>
        <dest>
            <xNome>CLUBE DE CAMPO MOEMA</xNome>
            <enderDest><UF>SP</UF></enderDest>
        </dest>
        <outro><xNome>NAO FILTRAR ESTE</xNome></outro>
    </infNFCom>
    <infNFCom id="2">
        <ide><cUF>33</cUF><nNF>1002</nNF></ide>
        <dest>
            <xNome>OUTRO CLIENTE</xNome>
            <enderDest><UF>RJ</UF></enderDest>
        </dest>
    </infNFCom>
    <infNFCom id="3">
        <ide><cUF>35</cUF><nNF>1003</nNF></ide>
        <dest>
            <enderDest><UF>SP</UF></enderDest>
        </dest>
    </infNFCom>
    <infNFCom id="4">
        <ide><cUF>31</cUF><nNF>1004</nNF></ide>
        <dest>
            <xNome>CLUBE DE CAMPO MOEMA</xNome>
            <enderDest><UF>MG</UF></enderDest>
        </dest>
    </infNFCom>
</documento>
"#;

/// Four `Fatura` records, each carrying its UF in a different candidate
/// location (and `f2` in lowercase).
pub const FATURAS_ONE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<envio>
    <Fatura id="f1">
        <infNFCom>
            <ide><nNF>1001</nNF></ide>
            <emit><xNome>Empresa SP</xNome><enderEmit><UF>SP</UF></enderEmit></emit>
        </infNFCom>
    </Fatura>
    <Fatura id="f2">
        <ide><nNF>1002</nNF></ide>
        <dest><xNome>Cliente SP</xNome><enderDest><UF>sp</UF></enderDest></dest>
    </Fatura>
    <Fatura id="f3">
        <ide><nNF>1003</nNF></ide>
        <emit><xNome>Empresa RJ</xNome><enderEmit><UF>RJ</UF></enderEmit></emit>
    </Fatura>
    <Fatura id="f4">
        <ide><nNF>1004</nNF></ide>
        <UF>MG</UF>
    </Fatura>
</envio>
"#;

pub const FATURAS_TWO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<envio>
    <Fatura id="f5">
        <ide><nNF>2001</nNF></ide>
        <dest><xNome>Outro Cliente SP</xNome><enderDest><UF>SP</UF></enderDest></dest>
    </Fatura>
    <Fatura id="f6">
        <ide><nNF>2002</nNF></ide>
        <dest><xNome>Cliente BA</xNome><enderDest><UF>BA</UF></enderDest></dest>
    </Fatura>
</envio>
"#;

pub fn buffer(name: &str, xml: &str) -> DocumentSource {
    DocumentSource::from_buffer(name, xml.as_bytes().to_vec())
}

/// Writes `xml` to `name` inside `dir` and returns the full path.
pub fn write_xml(dir: &TempDir, name: &str, xml: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, xml).expect("failed to write fixture file");
    path
}

/// A synthetic document with `n` repeated sibling blocks.
pub fn repeated_blocks(n: usize) -> String {
    let mut doc = String::with_capacity(n * 96);
    doc.push_str("<documento>");
    for i in 0..n {
        doc.push_str(&format!(
            "<infNFCom><ide><nNF>{i}</nNF></ide><dest><enderDest><UF>SP</UF></enderDest></dest></infNFCom>"
        ));
    }
    doc.push_str("</documento>");
    doc
}
