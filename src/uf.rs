/// Tag whose values are 2-digit IBGE state codes rather than UF abbreviations.
pub const CUF_TAG: &str = "cUF";

/// Maps a 2-digit IBGE state code to its UF abbreviation.
///
/// Unrecognized codes map to the empty string.
pub fn uf_from_code(code: &str) -> &'static str {
    match code {
        "11" => "RO",
        "12" => "AC",
        "13" => "AM",
        "14" => "RR",
        "15" => "PA",
        "16" => "AP",
        "17" => "TO",
        "21" => "MA",
        "22" => "PI",
        "23" => "CE",
        "24" => "RN",
        "25" => "PB",
        "26" => "PE",
        "27" => "AL",
        "28" => "SE",
        "29" => "BA",
        "31" => "MG",
        "32" => "ES",
        "33" => "RJ",
        "35" => "SP",
        "41" => "PR",
        "42" => "SC",
        "43" => "RS",
        "50" => "MS",
        "51" => "MT",
        "52" => "GO",
        "53" => "DF",
        _ => "",
    }
}

/// Presentation transform applied to extracted values when the requested tag
/// is [`CUF_TAG`].
pub fn format_uf(value: &str) -> String {
    uf_from_code(value.trim()).to_owned()
}
