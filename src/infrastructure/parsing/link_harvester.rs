//! Listing page link harvester
//!
//! The quick-access listings show every group (brand) once, followed by links to
//! all of its datasheets. Labels and link containers are read as two parallel
//! sequences; if they disagree in length the pairing cannot be trusted and the
//! listing yields nothing rather than a guessed alignment.

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use super::config::{ListingSelectors, ParsingConfig};
use super::context::ListingParseContext;
use super::dom::element_text;
use super::error::{HarvestError, HarvestResult, SelectorError, compile_selector};
use super::ContextualParser;
use crate::domain::{CatalogEntryRef, GroupedRefs, Taxonomy};

/// Compiled selectors for one listing template
struct ListingTemplate {
    container: Selector,
    container_source: String,
    group_label: Selector,
    group_links: Selector,
    link: Selector,
}

impl ListingTemplate {
    fn compile(selectors: &ListingSelectors) -> Result<Self, SelectorError> {
        Ok(Self {
            container: compile_selector(&selectors.container)?,
            container_source: selectors.container.clone(),
            group_label: compile_selector(&selectors.group_label)?,
            group_links: compile_selector(&selectors.group_links)?,
            link: compile_selector(&selectors.link)?,
        })
    }
}

/// Parser for listing pages of both taxonomies
pub struct LinkHarvester {
    primary: ListingTemplate,
    accessory: ListingTemplate,
}

impl LinkHarvester {
    /// Create a harvester with the default listing templates
    pub fn new() -> Result<Self, SelectorError> {
        Self::with_config(&ParsingConfig::default())
    }

    pub fn with_config(config: &ParsingConfig) -> Result<Self, SelectorError> {
        Ok(Self {
            primary: ListingTemplate::compile(&config.primary_listing)?,
            accessory: ListingTemplate::compile(&config.accessory_listing)?,
        })
    }

    const fn template(&self, taxonomy: Taxonomy) -> &ListingTemplate {
        match taxonomy {
            Taxonomy::Primary => &self.primary,
            Taxonomy::Accessory => &self.accessory,
        }
    }

    /// Harvest a listing. Structural problems are logged and produce an empty mapping.
    pub fn harvest(&self, html: &str, context: &ListingParseContext) -> GroupedRefs {
        let document = Html::parse_document(html);
        match self.parse_with_context(&document, context) {
            Ok(groups) => groups,
            Err(e) => {
                warn!("Harvest aborted for {} listing {}: {}", context.taxonomy, context.base_url, e);
                GroupedRefs::new()
            }
        }
    }

    fn collect_links(
        &self,
        template: &ListingTemplate,
        group: &str,
        container: ElementRef<'_>,
        base: &Url,
    ) -> Vec<CatalogEntryRef> {
        container
            .select(&template.link)
            .filter_map(|anchor| {
                let href = anchor.value().attr("href")?.trim();
                match resolve_link(base, href) {
                    Some(url) => Some(CatalogEntryRef::new(group, url)),
                    None => {
                        debug!("Ignoring unusable link '{}' under group '{}'", href, group);
                        None
                    }
                }
            })
            .collect()
    }
}

impl ContextualParser for LinkHarvester {
    type Output = GroupedRefs;
    type Context = ListingParseContext;
    type Error = HarvestError;

    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> HarvestResult<Self::Output> {
        let template = self.template(context.taxonomy);
        let base = Url::parse(&context.base_url).map_err(|e| HarvestError::InvalidBaseUrl {
            url: context.base_url.clone(),
            reason: e.to_string(),
        })?;

        let container = html
            .select(&template.container)
            .next()
            .ok_or_else(|| HarvestError::ContainerMissing {
                taxonomy: context.taxonomy,
                selector: template.container_source.clone(),
            })?;

        let labels: Vec<ElementRef> = container.select(&template.group_label).collect();
        let link_blocks: Vec<ElementRef> = container.select(&template.group_links).collect();

        if labels.len() != link_blocks.len() {
            return Err(HarvestError::StructuralMismatch {
                taxonomy: context.taxonomy,
                labels: labels.len(),
                containers: link_blocks.len(),
            });
        }

        let mut groups = GroupedRefs::new();
        for (label, block) in labels.into_iter().zip(link_blocks) {
            let group = element_text(label);
            if group.is_empty() {
                debug!("Skipping link block with a blank group label");
                continue;
            }
            let refs = self.collect_links(template, &group, block, &base);
            debug!("Group '{}': {} links", group, refs.len());
            groups.extend_group(&group, refs);
        }

        debug!(
            "Harvested {} groups / {} links from {} listing",
            groups.len(),
            groups.total_refs(),
            context.taxonomy
        );
        Ok(groups)
    }
}

/// Resolve an href against the listing URL; only web links survive.
fn resolve_link(base: &Url, href: &str) -> Option<String> {
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let url = base.join(href).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIMARY_URL: &str = "https://www.example.test/Kamera/Schnellzugriff.aspx";
    const ACCESSORY_URL: &str = "https://www.example.test/Objektiv/Schnellzugriff.aspx";

    fn primary_listing() -> &'static str {
        r#"<div id="center-col"><h2>Schnellzugriff</h2>
           <div class="schnellzugriff-links">
             <div class="schnellzugriff-hersteller">Nikon</div>
             <div class="schnellzugriff-produkt">
               <a href="/Kamera/Nikon/Z9.aspx">Z9</a>
               <a href="https://www.example.test/Kamera/Nikon/Z8.aspx">Z8</a>
               <a href="javascript:void(0)">mehr</a>
             </div>
             <div class="schnellzugriff-hersteller">Sony</div>
             <div class="schnellzugriff-produkt"><a href="Sony/A1.aspx">Alpha 1</a></div>
           </div></div>"#
    }

    #[test]
    fn harvests_primary_listing_in_order() {
        let harvester = LinkHarvester::new().unwrap();
        let groups = harvester.harvest(primary_listing(), &ListingParseContext::new(Taxonomy::Primary, PRIMARY_URL));

        assert_eq!(groups.group_names().collect::<Vec<_>>(), vec!["Nikon", "Sony"]);
        let nikon: Vec<_> = groups.get("Nikon").unwrap().iter().map(|r| r.source_ref.as_str()).collect();
        assert_eq!(
            nikon,
            vec![
                "https://www.example.test/Kamera/Nikon/Z9.aspx",
                "https://www.example.test/Kamera/Nikon/Z8.aspx",
            ]
        );
        assert_eq!(
            groups.get("Sony").unwrap()[0].source_ref,
            "https://www.example.test/Kamera/Sony/A1.aspx"
        );
        assert_eq!(groups.get("Sony").unwrap()[0].group, "Sony");
    }

    #[test]
    fn structural_mismatch_yields_empty_mapping() {
        let html = r#"<div class="schnellzugriff-links">
             <div class="schnellzugriff-hersteller">Nikon</div>
             <div class="schnellzugriff-hersteller">Sony</div>
             <div class="schnellzugriff-produkt"><a href="/z9">Z9</a></div>
           </div>"#;
        let harvester = LinkHarvester::new().unwrap();
        let ctx = ListingParseContext::new(Taxonomy::Primary, PRIMARY_URL);

        let err = harvester.parse_with_context(&Html::parse_document(html), &ctx).unwrap_err();
        assert_eq!(
            err,
            HarvestError::StructuralMismatch {
                taxonomy: Taxonomy::Primary,
                labels: 2,
                containers: 1
            }
        );
        assert!(harvester.harvest(html, &ctx).is_empty());
    }

    #[test]
    fn accessory_listing_pairs_headings_with_following_block() {
        let html = r#"<div class="schnellzugriff-links">
             <h3>Canon</h3><div><a href="/Objektiv/Canon/RF50.aspx">RF 50mm</a></div>
             <h3>Sigma</h3><div><a href="/Objektiv/Sigma/Art35.aspx">35mm Art</a>
                               <a href="/Objektiv/Sigma/Art85.aspx">85mm Art</a></div>
           </div>"#;
        let harvester = LinkHarvester::new().unwrap();
        let groups = harvester.harvest(html, &ListingParseContext::new(Taxonomy::Accessory, ACCESSORY_URL));

        assert_eq!(groups.group_names().collect::<Vec<_>>(), vec!["Canon", "Sigma"]);
        assert_eq!(groups.get("Sigma").unwrap().len(), 2);
        assert_eq!(groups.total_refs(), 3);
    }

    #[test]
    fn missing_container_yields_empty_mapping() {
        let harvester = LinkHarvester::new().unwrap();
        let groups = harvester.harvest("<p>Wartungsarbeiten</p>", &ListingParseContext::new(Taxonomy::Primary, PRIMARY_URL));
        assert!(groups.is_empty());
    }

    #[test]
    fn relative_base_url_is_rejected() {
        let harvester = LinkHarvester::new().unwrap();
        let ctx = ListingParseContext::new(Taxonomy::Primary, "Schnellzugriff.aspx");
        let err = harvester
            .parse_with_context(&Html::parse_document(primary_listing()), &ctx)
            .unwrap_err();
        assert!(matches!(err, HarvestError::InvalidBaseUrl { .. }));
    }
}
