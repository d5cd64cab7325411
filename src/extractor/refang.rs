// file: src/extractor/refang.rs
// description: reverses defanging obfuscation so indicators can be matched in canonical form
// reference: common defanging conventions in open threat reporting

use crate::models::IocType;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref FAKE_SCHEME: Regex =
        Regex::new(r"(?i)^(hxxp|h__p)").expect("FAKE_SCHEME regex is valid");
}

/// Converts a defanged indicator back to its standard form. Idempotent:
/// `refang(refang(x)) == refang(x)` for every input.
pub fn refang(value: &str, ioc_type: IocType) -> String {
    let mut refanged = value.replace("[.]", ".").replace("(.)", ".");
    refanged = refanged.replace("[:]", ":");

    if ioc_type == IocType::Email {
        refanged = refanged.replace("[@]", "@");
    }

    match ioc_type {
        IocType::Domain | IocType::Url | IocType::Email => {
            refanged = FAKE_SCHEME.replace(&refanged, "http").into_owned();
            // A single trailing dot is an artifact of sentence punctuation; a
            // double trailing dot indicates genuine ambiguity and is kept.
            if refanged.ends_with('.') && !refanged.ends_with("..") {
                refanged.pop();
            }
        }
        IocType::Ipv4 => {
            refanged = refanged.replace(' ', ".");
        }
        _ => {}
    }

    refanged.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bracket_dot_refang() {
        assert_eq!(refang("evil[.]com", IocType::Domain), "evil.com");
        assert_eq!(refang("evil(.)com", IocType::Domain), "evil.com");
    }

    #[test]
    fn test_url_scheme_refang() {
        assert_eq!(
            refang("hxxp://evil[.]com/path", IocType::Url),
            "http://evil.com/path"
        );
        assert_eq!(
            refang("hxxps://evil[.]com", IocType::Url),
            "https://evil.com"
        );
        assert_eq!(refang("h__ps://evil.com", IocType::Url), "https://evil.com");
    }

    #[test]
    fn test_email_refang() {
        assert_eq!(
            refang("user[@]evil[.]com", IocType::Email),
            "user@evil.com"
        );
    }

    #[test]
    fn test_ipv4_spaced_octets() {
        assert_eq!(refang("1 2 3 4", IocType::Ipv4), "1.2.3.4");
        assert_eq!(refang("1[.]2[.]3[.]4", IocType::Ipv4), "1.2.3.4");
    }

    #[test]
    fn test_trailing_dot_stripped_once() {
        assert_eq!(refang("evil.com.", IocType::Domain), "evil.com");
        // Double trailing dot is preserved as-is.
        assert_eq!(refang("evil.com..", IocType::Domain), "evil.com..");
    }

    #[test]
    fn test_hashes_pass_through() {
        let md5 = "d41d8cd98f00b204e9800998ecf8427e";
        assert_eq!(refang(md5, IocType::Md5), md5);
    }

    #[test]
    fn test_refang_is_idempotent() {
        let cases = [
            ("hxxp://evil[.]com/a.exe", IocType::Url),
            ("evil[.]com.", IocType::Domain),
            ("user[@]evil[.]com", IocType::Email),
            ("10 0 0 1", IocType::Ipv4),
            ("CVE-2024-1234", IocType::Cve),
            ("evil.com..", IocType::Domain),
        ];
        for (input, ioc_type) in cases {
            let once = refang(input, ioc_type);
            let twice = refang(&once, ioc_type);
            assert_eq!(once, twice, "refang not idempotent for {input}");
        }
    }
}
