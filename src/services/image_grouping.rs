// src/services/image_grouping.rs
//
// Distribui os arquivos enviados entre as cores declaradas do produto.
// Nenhum arquivo é descartado e o resultado é sempre o mesmo para a mesma entrada.

use crate::{models::variants::UploadedFile, services::variant_keys::color_key};

#[derive(Debug)]
pub struct ImageGrouping<'a> {
    // Uma entrada por cor declarada, na ordem de declaração.
    groups: Vec<(String, Vec<&'a UploadedFile>)>,
    /// Arquivos sem cor possível (produto sem cores declaradas).
    pub unassigned: Vec<&'a UploadedFile>,
    pub warnings: Vec<String>,
}

impl<'a> ImageGrouping<'a> {
    pub fn files_for(&self, color: &str) -> &[&'a UploadedFile] {
        let key = color_key(color);
        self.groups
            .iter()
            .find(|(declared, _)| color_key(declared) == key)
            .map(|(_, files)| files.as_slice())
            .unwrap_or(&[])
    }

    /// Cores que receberam pelo menos um arquivo.
    pub fn colors_with_files(&self) -> impl Iterator<Item = &str> {
        self.groups
            .iter()
            .filter(|(_, files)| !files.is_empty())
            .map(|(color, _)| color.as_str())
    }
}

pub fn group_images<'a>(
    files: &'a [UploadedFile],
    declared_colors: &[String],
    color_map: Option<&[String]>,
) -> ImageGrouping<'a> {
    // Cores únicas (sem diferenciar maiúsculas), preservando a primeira grafia.
    let mut groups: Vec<(String, Vec<&'a UploadedFile>)> = Vec::new();
    for color in declared_colors {
        let trimmed = color.trim();
        if trimmed.is_empty() || groups.iter().any(|(c, _)| color_key(c) == color_key(trimmed)) {
            continue;
        }
        groups.push((trimmed.to_string(), Vec::new()));
    }

    let mut grouping = ImageGrouping {
        groups,
        unassigned: Vec::new(),
        warnings: Vec::new(),
    };

    if files.is_empty() {
        return grouping;
    }
    if grouping.groups.is_empty() {
        grouping.warnings.push(format!(
            "{} imagem(ns) recebida(s), mas o produto não declara nenhuma cor",
            files.len()
        ));
        grouping.unassigned.extend(files.iter());
        return grouping;
    }

    // Mapa posicional só vale se tiver exatamente um item por arquivo.
    let positional = match color_map {
        Some(map) if map.len() == files.len() => Some(map),
        Some(map) => {
            grouping.warnings.push(format!(
                "mapa de cores com {} item(ns) para {} arquivo(s); usando o nome dos campos",
                map.len(),
                files.len()
            ));
            None
        }
        None => None,
    };

    for (i, file) in files.iter().enumerate() {
        let mapped = positional.and_then(|map| {
            let index = declared_index(&grouping.groups, &map[i]);
            if index.is_none() {
                grouping.warnings.push(format!(
                    "arquivo '{}' mapeado para a cor '{}', que não foi declarada",
                    file.file_name, map[i]
                ));
            }
            index
        });

        let index = match mapped {
            Some(index) => index,
            None => match match_field_name(&grouping.groups, &file.field_name) {
                Some(index) => index,
                None => {
                    grouping.warnings.push(format!(
                        "arquivo '{}' (campo '{}') sem cor identificável; atribuído a '{}'",
                        file.file_name, file.field_name, grouping.groups[0].0
                    ));
                    0
                }
            },
        };
        grouping.groups[index].1.push(file);
    }

    for warning in &grouping.warnings {
        tracing::warn!("⚠️ Agrupamento de imagens: {}", warning);
    }
    grouping
}

fn declared_index(groups: &[(String, Vec<&UploadedFile>)], color: &str) -> Option<usize> {
    let key = color_key(color);
    if key.is_empty() {
        return None;
    }
    groups.iter().position(|(declared, _)| color_key(declared) == key)
}

// 1) tag explícita no nome do campo; 2) cor contida no nome do campo
// (a cor mais longa vence, empates pela ordem de declaração).
fn match_field_name(groups: &[(String, Vec<&UploadedFile>)], field_name: &str) -> Option<usize> {
    if let Some(tag) = color_tag(field_name) {
        if let Some(index) = declared_index(groups, &tag) {
            return Some(index);
        }
    }

    let haystack = field_name.to_lowercase();
    let mut best: Option<(usize, usize)> = None; // (índice, tamanho)
    for (index, (declared, _)) in groups.iter().enumerate() {
        let needle = color_key(declared);
        if needle.is_empty() || !haystack.contains(&needle) {
            continue;
        }
        if best.is_none_or(|(_, len)| needle.len() > len) {
            best = Some((index, needle.len()));
        }
    }
    best.map(|(index, _)| index)
}

/// `images[color=Red]`, `color:Red`, `color_Red` -> `Red`.
fn color_tag(field_name: &str) -> Option<String> {
    let lower = field_name.to_ascii_lowercase();
    let start = lower.find("color")? + "color".len();
    let rest = field_name[start..].strip_prefix(['=', ':', '_', '[', '-'])?;
    let value: String = rest
        .chars()
        .take_while(|c| !matches!(c, ']' | '&' | ';' | '/' | ','))
        .collect();
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
