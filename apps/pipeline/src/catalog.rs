/// A named group of tickers; the name doubles as the output sub-directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub tickers: Vec<String>,
}

/// Ordered instrument catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    categories: Vec<Category>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a category. Repeated tickers are kept once, in first-seen order.
    pub fn with_category(mut self, name: &str, tickers: &[&str]) -> Self {
        let mut unique: Vec<String> = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            let ticker = ticker.trim();
            if !ticker.is_empty() && !unique.iter().any(|t| t == ticker) {
                unique.push(ticker.to_string());
            }
        }

        self.categories.push(Category {
            name: name.to_string(),
            tickers: unique,
        });
        self
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn get(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Yahoo Finance tickers tracked by default.
    pub fn builtin() -> Self {
        Self::new()
            .with_category(
                "stocks",
                &[
                    "AAPL",
                    "KO",
                    "MSFT",
                    "NKE",
                    "JPM",
                    "GE",
                    "BLK",
                    "ALB",
                    "SQM",
                    "TATASTEEL.NS",
                    "HINDALCO.NS",
                    "RIO.AX",
                    "BHP.AX",
                ],
            )
            .with_category(
                "etfs",
                &[
                    "NDQ.AX", "IOO", "ETHI.AX", "SYI.AX", "IXJ.AX", "IEM.AX", "CRED.AX", "IOZ.AX",
                    "DHHF.AX", "TQQQ",
                ],
            )
            .with_category(
                "real_estate",
                &["SCG.AX", "SGP.AX", "MGR.AX", "DXS.AX", "VAP.AX", "SLF.AX"],
            )
            .with_category("currencies", &["EURUSD=X", "JPY=X", "GBPUSD=X", "AUDUSD=X"])
            .with_category("banks", &["NAB.AX", "CBA.AX", "ANZ.AX"])
            .with_category("commodities", &["GC=F", "CL=F", "SI=F", "HG=F", "PL=F"])
    }
}
