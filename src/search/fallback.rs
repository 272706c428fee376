//! Static competitor set used when no live provider returns anything.
//!
//! Both candidates ship with their article text, so the scrape step uses them
//! without any network access and the rewrite job can always proceed.

use crate::models::SearchCandidate;

const CUSTOMER_SERVICE_URL: &str = "https://www.forbes.com/demo-article-1";
const SMALL_BUSINESS_URL: &str = "https://www.entrepreneur.com/demo-article-2";

const CUSTOMER_SERVICE_BODY: &str = "\
Businesses are under constant pressure to answer customers faster without letting \
support costs climb. AI chatbots have become one of the most practical ways to do both.

Early chatbots followed rigid decision trees. Modern conversational agents understand \
context, pick up on sentiment, and handle multi-step questions, which makes them useful \
well beyond a scripted FAQ.

The benefits are easy to measure. A chatbot is available around the clock, answers \
instantly instead of placing customers in a queue, and absorbs routine requests so human \
agents can focus on the conversations that need judgment. Teams that automate common \
inquiries routinely report support cost reductions of up to thirty percent.

Companies use chatbots for troubleshooting, lead qualification, order tracking, and \
personalized product recommendations. As language models improve, those interactions \
feel increasingly natural, and early adopters gain a lasting advantage in customer \
experience.";

const SMALL_BUSINESS_BODY: &str = "\
Small businesses compete with larger rivals on tight budgets and small teams, which makes \
consistent customer service hard to deliver. Chatbots help level that playing field.

A chatbot lets a small team handle hundreds of conversations at once without adding \
headcount, and it keeps capturing leads after business hours when visitors would \
otherwise leave without a reply.

Start simple: cover frequently asked questions first and expand once the basics work. \
Personalize conversations with the customer data you already have, and make sure complex \
requests are handed to a person smoothly.

Track response times, customer satisfaction, lead conversion, and cost per interaction to \
see whether the investment is paying off. Modern no-code platforms include templates for \
common small business scenarios, so getting started no longer requires a development team.";

/// The two fixed demo competitors, in rank order.
pub fn demo_candidates() -> Vec<SearchCandidate> {
    vec![
        SearchCandidate {
            title: "How AI Chatbots Are Revolutionizing Customer Service".to_string(),
            url: CUSTOMER_SERVICE_URL.to_string(),
            snippet: None,
            content: Some(CUSTOMER_SERVICE_BODY.to_string()),
        },
        SearchCandidate {
            title: "The Ultimate Guide to Chatbots for Small Business Growth".to_string(),
            url: SMALL_BUSINESS_URL.to_string(),
            snippet: None,
            content: Some(SMALL_BUSINESS_BODY.to_string()),
        },
    ]
}
