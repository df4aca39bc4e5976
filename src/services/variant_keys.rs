// src/services/variant_keys.rs
//
// Regras puras de identidade e SKU das variantes.

use std::collections::HashSet;

use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::catalog::{SkuOwner, VariantCodeOwner},
};

/// Código usado no SKU quando o produto não tem categoria (ou ela não tem código).
pub const GENERIC_CATEGORY_CODE: &str = "GEN";

/// Identidade de uma variante dentro do produto: (cor, tamanho), sem
/// diferenciar maiúsculas e espaços nas pontas. É a mesma regra do índice
/// único `product_variants_identity_key`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariantKey {
    color: String,
    size: String,
}

impl VariantKey {
    pub fn new(color: &str, size: &str) -> Self {
        Self {
            color: color_key(color),
            size: size.trim().to_lowercase(),
        }
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn size(&self) -> &str {
        &self.size
    }
}

/// Chave de identidade completa, usada para localizar a linha numa atualização de estoque.
pub fn identity_key(product_id: Uuid, color: &str, size: &str) -> (Uuid, VariantKey) {
    (product_id, VariantKey::new(color, size))
}

/// Chave de agrupamento por cor (imagens e códigos são compartilhados por cor).
pub fn color_key(color: &str) -> String {
    color.trim().to_lowercase()
}

/// `{produto}-{categoria|GEN}-{cor}-{tamanho}`, em maiúsculas, espaços viram `-`.
/// Não é injetiva ("Dark Blue" e "Dark-Blue" dão o mesmo SKU): quem monta
/// vários SKUs derivados passa por `disambiguate_derived_skus`.
pub fn derive_sku(product_code: &str, category_code: Option<&str>, color: &str, size: &str) -> String {
    let category = category_code
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(GENERIC_CATEGORY_CODE);

    [product_code, category, color, size]
        .iter()
        .map(|segment| sku_segment(segment))
        .collect::<Vec<_>>()
        .join("-")
}

fn sku_segment(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_uppercase()
}

/// Primeiro SKU livre a partir de `base`: o próprio, ou `base-2`, `base-3`...
/// O escolhido entra em `taken`.
pub fn next_free_sku(base: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(base.to_string()) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", base, n);
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Resolve colisões de SKUs DERIVADOS com sufixo numérico. SKUs informados
/// (ou herdados) ficam como vieram e reservam o valor; `reserved` traz os
/// SKUs já usados por outros produtos.
pub fn disambiguate_derived_skus(
    skus: &mut [String],
    derived: &[bool],
    reserved: &HashSet<String>,
) {
    let mut taken: HashSet<String> = reserved.clone();
    taken.extend(
        skus.iter()
            .zip(derived)
            .filter(|(_, is_derived)| !**is_derived)
            .map(|(sku, _)| sku.clone()),
    );
    for (sku, is_derived) in skus.iter_mut().zip(derived) {
        if *is_derived {
            *sku = next_free_sku(sku, &mut taken);
        }
    }
}

/// Falha se algum SKU pedido se repete na própria requisição ou pertence a
/// OUTRO produto. SKUs do próprio produto (rebuild) são permitidos.
pub fn ensure_skus_available(
    requested: &[String],
    owners: &[SkuOwner],
    product_id: Option<Uuid>,
) -> Result<(), AppError> {
    let mut seen = HashSet::new();
    for sku in requested {
        if !seen.insert(sku.as_str()) {
            return Err(AppError::DuplicateSku(sku.clone()));
        }
    }

    match owners.iter().find(|o| Some(o.product_id) != product_id) {
        Some(taken) => Err(AppError::DuplicateSku(taken.sku.clone())),
        None => Ok(()),
    }
}

/// Códigos de variante só conflitam com variantes de outros produtos.
pub fn ensure_variant_codes_available(
    owners: &[VariantCodeOwner],
    product_id: Option<Uuid>,
) -> Result<(), AppError> {
    match owners.iter().find(|o| Some(o.product_id) != product_id) {
        Some(taken) => Err(AppError::DuplicateVariantCode(taken.code.clone())),
        None => Ok(()),
    }
}

/// Remove brancos e repetidos, preservando a ordem.
pub fn normalize_codes(codes: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    codes
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty() && seen.insert(c.to_string()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_readable_sku_with_generic_fallback() {
        assert_eq!(derive_sku("TS01", Some("CAM"), "Red", "M"), "TS01-CAM-RED-M");
        assert_eq!(derive_sku("TS01", None, "Red", "M"), "TS01-GEN-RED-M");
        assert_eq!(derive_sku("TS01", Some("  "), "Dark  Blue", "xl "), "TS01-GEN-DARK-BLUE-XL");
    }

    #[test]
    fn distinct_colors_deriving_the_same_sku_get_a_suffix() {
        let dark_blue = derive_sku("TS01", None, "Dark Blue", "M");
        let dashed = derive_sku("TS01", None, "Dark-Blue", "M");
        assert_eq!(dark_blue, dashed);
        assert_ne!(VariantKey::new("Dark Blue", "M"), VariantKey::new("Dark-Blue", "M"));

        let mut skus = vec![dark_blue, dashed, "TS01-GEN-RED-M".to_string()];
        disambiguate_derived_skus(&mut skus, &[true, true, true], &HashSet::new());
        assert_eq!(skus, vec!["TS01-GEN-DARK-BLUE-M", "TS01-GEN-DARK-BLUE-M-2", "TS01-GEN-RED-M"]);
    }

    #[test]
    fn informed_and_foreign_skus_are_never_renamed() {
        let reserved: HashSet<String> = ["TS01-GEN-RED-S".to_string()].into();
        let mut skus = vec![
            "TS01-GEN-RED-M".to_string(), // derivado
            "TS01-GEN-RED-M".to_string(), // informado pelo cliente
            "TS01-GEN-RED-S".to_string(), // derivado, já é de outro produto
        ];
        disambiguate_derived_skus(&mut skus, &[true, false, true], &reserved);
        assert_eq!(skus, vec!["TS01-GEN-RED-M-2", "TS01-GEN-RED-M", "TS01-GEN-RED-S-2"]);

        // Informados repetidos continuam repetidos: o conflito é de quem os enviou.
        let mut explicit = vec!["A-1".to_string(), "A-1".to_string()];
        disambiguate_derived_skus(&mut explicit, &[false, false], &HashSet::new());
        assert!(ensure_skus_available(&explicit, &[], None).is_err());
    }

    #[test]
    fn variant_identity_ignores_case_and_padding() {
        assert_eq!(VariantKey::new(" Red", "m"), VariantKey::new("RED", "M "));
        assert_ne!(VariantKey::new("Red", "M"), VariantKey::new("Red", "L"));

        let product = Uuid::new_v4();
        assert_eq!(identity_key(product, "Blue", "S"), identity_key(product, "blue", "s"));
        assert_ne!(identity_key(product, "Blue", "S"), identity_key(Uuid::new_v4(), "Blue", "S"));
    }

    #[test]
    fn sku_owned_by_another_product_conflicts() {
        let other = Uuid::new_v4();
        let owners = vec![SkuOwner { sku: "A-1".into(), product_id: other }];

        let err = ensure_skus_available(&["A-1".into()], &owners, None).unwrap_err();
        assert!(matches!(err, AppError::DuplicateSku(sku) if sku == "A-1"));

        let err = ensure_skus_available(&["A-1".into()], &owners, Some(Uuid::new_v4())).unwrap_err();
        assert_eq!(err.kind(), "ConflictError");
    }

    #[test]
    fn sku_owned_by_same_product_is_allowed() {
        let me = Uuid::new_v4();
        let owners = vec![SkuOwner { sku: "A-1".into(), product_id: me }];
        assert!(ensure_skus_available(&["A-1".into()], &owners, Some(me)).is_ok());
    }

    #[test]
    fn repeated_sku_in_the_same_request_conflicts() {
        let err = ensure_skus_available(&["A-1".into(), "A-1".into()], &[], None).unwrap_err();
        assert!(matches!(err, AppError::DuplicateSku(_)));
    }

    #[test]
    fn variant_codes_only_conflict_across_products() {
        let me = Uuid::new_v4();
        let mine = vec![VariantCodeOwner { code: "EAN-1".into(), product_id: me }];
        assert!(ensure_variant_codes_available(&mine, Some(me)).is_ok());

        let err = ensure_variant_codes_available(&mine, Some(Uuid::new_v4())).unwrap_err();
        assert!(matches!(err, AppError::DuplicateVariantCode(code) if code == "EAN-1"));
    }

    #[test]
    fn normalizes_codes() {
        let codes = vec![" A ".into(), "".into(), "B".into(), "A".into()];
        assert_eq!(normalize_codes(&codes), vec!["A".to_string(), "B".to_string()]);
    }
}
